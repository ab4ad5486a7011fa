//! JSON scripts for the matrix simulator.
//!
//! ```json
//! {
//!   "duration_us": 20000,
//!   "presses": [
//!     { "group": 0, "position": 0, "from_us": 1000, "until_us": 9000, "chatter_us": 300 }
//!   ],
//!   "supply": [ { "at_us": 15000, "present": false } ],
//!   "inbound_us": [ 2500 ]
//! }
//! ```

use pingboard_core::{KeyPosition, Micros, Supply};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("malformed script: {0}")]
    Json(#[from] serde_json::Error),
    #[error("step_us must be non-zero")]
    ZeroStep,
    #[error("key ({group}, {position}) does not exist")]
    NoSuchKey { group: usize, position: usize },
    #[error("press of key ({group}, {position}) ends before it starts")]
    BackwardsPress { group: usize, position: usize },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub duration_us: Micros,
    /// Time between scan loop iterations.
    #[serde(default = "default_step")]
    pub step_us: Micros,
    #[serde(default = "default_present")]
    pub initial_supply_present: bool,
    #[serde(default)]
    pub presses: Vec<Press>,
    /// Supply changes after startup.
    #[serde(default)]
    pub supply: Vec<SupplyChange>,
    /// Arrival times of messages from the host.
    #[serde(default)]
    pub inbound_us: Vec<Micros>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Press {
    pub group: usize,
    pub position: usize,
    pub from_us: Micros,
    pub until_us: Micros,
    /// The contact chatters open and closed for this long after `from_us`.
    #[serde(default)]
    pub chatter_us: Micros,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplyChange {
    pub at_us: Micros,
    pub present: bool,
}

fn default_step() -> Micros {
    10
}

fn default_present() -> bool {
    true
}

impl Script {
    pub fn parse(json: &str) -> Result<Script, ScriptError> {
        let script: Script = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> Result<(), ScriptError> {
        if self.step_us == 0 {
            return Err(ScriptError::ZeroStep);
        }
        for press in &self.presses {
            if !press.key().is_real() {
                return Err(ScriptError::NoSuchKey {
                    group: press.group,
                    position: press.position,
                });
            }
            if press.until_us < press.from_us {
                return Err(ScriptError::BackwardsPress {
                    group: press.group,
                    position: press.position,
                });
            }
        }
        Ok(())
    }

    pub fn initial_supply(&self) -> Supply {
        supply_from(self.initial_supply_present)
    }
}

impl Press {
    pub fn key(&self) -> KeyPosition {
        KeyPosition::new(self.group, self.position)
    }

    /// Whether the contact is closed at `now`, given the scan step used for chatter.
    pub fn is_closed(&self, now: Micros, step: Micros) -> bool {
        if now < self.from_us || now >= self.until_us {
            return false;
        }
        let since = now - self.from_us;
        if since < self.chatter_us {
            return (since / step) % 2 == 0;
        }
        true
    }
}

impl SupplyChange {
    pub fn supply(&self) -> Supply {
        supply_from(self.present)
    }
}

fn supply_from(present: bool) -> Supply {
    if present {
        Supply::Present
    } else {
        Supply::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_script_gets_defaults() {
        let script = Script::parse(r#"{ "duration_us": 5000 }"#).unwrap();
        assert_eq!(script.step_us, 10);
        assert_eq!(script.initial_supply(), Supply::Present);
        assert!(script.presses.is_empty());
        assert!(script.supply.is_empty());
    }

    #[test]
    fn phantom_key_is_rejected() {
        let err = Script::parse(
            r#"{ "duration_us": 5000,
                 "presses": [ { "group": 8, "position": 2, "from_us": 0, "until_us": 10 } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::NoSuchKey { group: 8, position: 2 }));
    }

    #[test]
    fn backwards_press_is_rejected() {
        let err = Script::parse(
            r#"{ "duration_us": 5000,
                 "presses": [ { "group": 1, "position": 2, "from_us": 50, "until_us": 10 } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::BackwardsPress { .. }));
    }

    #[test]
    fn zero_step_is_rejected() {
        let err = Script::parse(r#"{ "duration_us": 5000, "step_us": 0 }"#).unwrap_err();
        assert!(matches!(err, ScriptError::ZeroStep));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Script::parse(r#"{ "duration_us": 5000, "velocity": 3 }"#).unwrap_err();
        assert!(matches!(err, ScriptError::Json(_)));
    }

    #[test]
    fn chatter_alternates_per_step() {
        let press = Press {
            group: 0,
            position: 0,
            from_us: 100,
            until_us: 1000,
            chatter_us: 40,
        };
        let closed: Vec<bool> = (0..7).map(|i| press.is_closed(100 + i * 10, 10)).collect();
        assert_eq!(closed, [true, false, true, false, true, true, true]);
        assert!(!press.is_closed(99, 10));
        assert!(!press.is_closed(1000, 10));
    }
}
