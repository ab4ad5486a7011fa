//! Class-compliant USB-MIDI device for the ATmega32U4.
//!
//! One MIDIStreaming interface with an embedded IN/OUT jack pair. Note
//! events go out on the bulk IN endpoint as 4-byte USB-MIDI event packets;
//! anything the host sends on the bulk OUT endpoint is thrown away. Uses
//! direct register access via avr-device.

use avr_device::atmega32u4::Peripherals;
use pingboard_core::{EventSink, InboundDrain, DEVICE_NAME};

const EP0_SIZE: u8 = 64;
/// Bulk IN endpoint carrying note events to the host.
const EP_IN: u8 = 1;
/// Bulk OUT endpoint for whatever the host sends.
const EP_OUT: u8 = 2;
const EP_BULK_SIZE: u8 = 64;

/// Code index numbers, cable 0.
const CIN_NOTE_OFF: u8 = 0x08;
const CIN_NOTE_ON: u8 = 0x09;

static DEVICE_DESCRIPTOR: [u8; 18] = [
    18,   // bLength
    1,    // bDescriptorType (Device)
    0x00, 0x02, // bcdUSB (2.0)
    0,    // bDeviceClass (defined at interface level)
    0,    // bDeviceSubClass
    0,    // bDeviceProtocol
    EP0_SIZE, // bMaxPacketSize0
    0xC0, 0x16, // idVendor (0x16C0, Van Ooijen Technische Informatica)
    0x85, 0x04, // idProduct (0x0485, Teensy MIDI)
    0x01, 0x00, // bcdDevice (1.0)
    0,    // iManufacturer
    1,    // iProduct
    0,    // iSerialNumber
    1,    // bNumConfigurations
];

/// USB-MIDI 1.0 configuration: Audio Control + MIDIStreaming.
static CONFIG_DESCRIPTOR: [u8; 101] = [
    // Configuration descriptor
    9,    // bLength
    2,    // bDescriptorType (Configuration)
    101, 0, // wTotalLength
    2,    // bNumInterfaces
    1,    // bConfigurationValue
    0,    // iConfiguration
    0x80, // bmAttributes (bus powered)
    50,   // bMaxPower (100mA)
    // Standard Audio Control interface
    9, 4, 0, 0, 0,
    1,    // bInterfaceClass (Audio)
    1,    // bInterfaceSubClass (Audio Control)
    0, 0,
    // Class-specific Audio Control header
    9, 0x24, 1,
    0x00, 0x01, // bcdADC (1.0)
    9, 0, // wTotalLength
    1,    // bInCollection
    1,    // baInterfaceNr (MIDIStreaming)
    // Standard MIDIStreaming interface
    9, 4, 1, 0,
    2,    // bNumEndpoints
    1,    // bInterfaceClass (Audio)
    3,    // bInterfaceSubClass (MIDIStreaming)
    0, 0,
    // Class-specific MIDIStreaming header
    7, 0x24, 1,
    0x00, 0x01, // bcdMSC (1.0)
    65, 0, // wTotalLength
    // MIDI IN jack, embedded, ID 1
    6, 0x24, 2, 1, 1, 0,
    // MIDI IN jack, external, ID 2
    6, 0x24, 2, 2, 2, 0,
    // MIDI OUT jack, embedded, ID 3, source jack 2
    9, 0x24, 3, 1, 3, 1, 2, 1, 0,
    // MIDI OUT jack, external, ID 4, source jack 1
    9, 0x24, 3, 2, 4, 1, 1, 1, 0,
    // Bulk OUT endpoint (EP2)
    9, 5, EP_OUT, 0x02, EP_BULK_SIZE, 0, 0, 0, 0,
    // Class-specific bulk OUT endpoint: embedded IN jack 1
    5, 0x25, 1, 1, 1,
    // Bulk IN endpoint (EP1)
    9, 5, 0x80 | EP_IN, 0x02, EP_BULK_SIZE, 0, 0, 0, 0,
    // Class-specific bulk IN endpoint: embedded OUT jack 3
    5, 0x25, 1, 1, 3,
];

/// String descriptor 0 (language ID)
static STRING_DESC_0: [u8; 4] = [4, 3, 0x09, 0x04]; // English (US)

const NAME_LEN: usize = DEVICE_NAME.len();

/// String descriptor 1 (product): the device name as UTF-16LE.
static STRING_DESC_PRODUCT: [u8; 2 + 2 * NAME_LEN] = product_descriptor();

const fn product_descriptor() -> [u8; 2 + 2 * NAME_LEN] {
    let name = DEVICE_NAME.as_bytes();
    let mut desc = [0u8; 2 + 2 * NAME_LEN];
    desc[0] = (2 + 2 * NAME_LEN) as u8;
    desc[1] = 3;
    let mut i = 0;
    while i < NAME_LEN {
        desc[2 + 2 * i] = name[i];
        i += 1;
    }
    desc
}

const GET_DESCRIPTOR: u8 = 0x06;
const SET_ADDRESS: u8 = 0x05;
const GET_CONFIGURATION: u8 = 0x08;
const SET_CONFIGURATION: u8 = 0x09;

/// The fields of a SETUP packet this device looks at.
struct Setup {
    request_type: u8,
    request: u8,
    value: u16,
    length: u16,
}

/// USB device state.
pub struct UsbMidi<'a> {
    dp: &'a Peripherals,
    configured: bool,
}

impl<'a> UsbMidi<'a> {
    pub fn new(dp: &'a Peripherals) -> Self {
        Self {
            dp,
            configured: false,
        }
    }

    /// Initialize the ATmega32U4 USB controller.
    pub fn init(&mut self) {
        let dp = self.dp;
        let usb = &dp.USB_DEVICE;

        // Enable USB pad regulator
        usb.uhwcon.write(|w| w.uvrege().set_bit());

        // Enable USB controller and VBUS pad
        usb.usbcon
            .write(|w| w.usbe().set_bit().otgpade().set_bit());

        // Configure PLL for 16MHz crystal -> 96MHz PLL -> 48MHz USB clock
        dp.PLL.pllcsr.write(|w| w.pindiv().set_bit().plle().set_bit());
        while dp.PLL.pllcsr.read().plock().bit_is_clear() {}

        // Enable USB clock and attach
        usb.usbcon.modify(|_, w| w.frzclk().clear_bit());
        usb.udcon.modify(|_, w| w.detach().clear_bit());

        self.configured = false;
    }

    /// Poll for USB events and handle them. Call this from the main loop.
    pub fn poll(&mut self) {
        let usb = &self.dp.USB_DEVICE;

        let udint = usb.udint.read();

        // End of reset
        if udint.eorsti().bit_is_set() {
            usb.udint.modify(|_, w| w.eorsti().clear_bit());
            self.configure_ep0();
            self.configured = false;
        }

        // Check for SETUP packet on EP0
        self.select_endpoint(0);
        if usb.ueintx.read().rxstpi().bit_is_set() {
            self.handle_setup();
        }
    }

    /// Queue one USB-MIDI event packet on the IN endpoint.
    fn send_packet(&mut self, packet: [u8; 4]) {
        if !self.configured {
            return;
        }

        let usb = &self.dp.USB_DEVICE;
        self.select_endpoint(EP_IN);

        // Wait for bank space, dropping the event if the host is not reading
        let mut timeout: u16 = 0xFFFF;
        while usb.ueintx.read().rwal().bit_is_clear() {
            timeout = timeout.wrapping_sub(1);
            if timeout == 0 {
                return;
            }
        }

        for byte in packet {
            usb.uedatx.write(|w| w.bits(byte));
        }

        // Clear TXINI and FIFOCON to send
        usb.ueintx
            .modify(|_, w| w.fifocon().clear_bit().txini().clear_bit());
    }

    fn configure_ep0(&self) {
        let usb = &self.dp.USB_DEVICE;

        self.select_endpoint(0);
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x.write(|w| w.eptype().bits(0b00));
        usb.uecfg1x.write(|w| w.epsize().bits(0b011).alloc().set_bit());
    }

    fn configure_bulk_endpoints(&self) {
        let usb = &self.dp.USB_DEVICE;

        self.select_endpoint(EP_IN);
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x
            .write(|w| w.eptype().bits(0b10).epdir().set_bit());
        usb.uecfg1x.write(|w| w.epsize().bits(0b011).alloc().set_bit());

        self.select_endpoint(EP_OUT);
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x.write(|w| w.eptype().bits(0b10));
        usb.uecfg1x.write(|w| w.epsize().bits(0b011).alloc().set_bit());
    }

    fn select_endpoint(&self, ep: u8) {
        self.dp.USB_DEVICE.uenum.write(|w| w.bits(ep & 0x07));
    }

    fn read_setup(&self) -> Setup {
        let usb = &self.dp.USB_DEVICE;
        let mut raw = [0u8; 8];
        for byte in raw.iter_mut() {
            *byte = usb.uedatx.read().bits();
        }
        usb.ueintx.modify(|_, w| w.rxstpi().clear_bit());

        Setup {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    /// Zero-length status stage for a host-to-device request.
    fn acknowledge(&self) {
        let usb = &self.dp.USB_DEVICE;
        usb.ueintx.modify(|_, w| w.txini().clear_bit());
    }

    fn handle_setup(&mut self) {
        let setup = self.read_setup();
        let [index, kind] = setup.value.to_le_bytes();

        match (setup.request_type, setup.request) {
            (0x80, GET_DESCRIPTOR) => {
                let desc: &[u8] = match (kind, index) {
                    (1, _) => &DEVICE_DESCRIPTOR,
                    (2, _) => &CONFIG_DESCRIPTOR,
                    (3, 0) => &STRING_DESC_0,
                    (3, 1) => &STRING_DESC_PRODUCT,
                    _ => return self.stall(),
                };
                self.send_descriptor(desc, setup.length);
            }
            (0x00, SET_ADDRESS) => {
                // Address takes effect after the status stage
                let usb = &self.dp.USB_DEVICE;
                self.acknowledge();
                while usb.ueintx.read().txini().bit_is_clear() {}
                usb.udaddr
                    .write(|w| w.uadd().bits(index & 0x7F).adden().set_bit());
            }
            (0x00, SET_CONFIGURATION) => {
                self.acknowledge();
                self.configure_bulk_endpoints();
                self.configured = true;
            }
            (0x80, GET_CONFIGURATION) => {
                let usb = &self.dp.USB_DEVICE;
                while usb.ueintx.read().txini().bit_is_clear() {}
                usb.uedatx.write(|w| w.bits(u8::from(self.configured)));
                self.acknowledge();
            }
            // Alternate settings and class requests are not supported
            _ => self.stall(),
        }
    }

    fn send_descriptor(&self, desc: &[u8], max_length: u16) {
        let usb = &self.dp.USB_DEVICE;
        let len = core::cmp::min(desc.len(), max_length as usize);
        let mut sent = 0;

        while sent < len {
            while usb.ueintx.read().txini().bit_is_clear() {}

            let chunk_end = core::cmp::min(sent + EP0_SIZE as usize, len);
            for &byte in &desc[sent..chunk_end] {
                usb.uedatx.write(|w| w.bits(byte));
            }

            usb.ueintx.modify(|_, w| w.txini().clear_bit());
            sent = chunk_end;
        }

        // Wait for status stage (host sends ZLP)
        while usb.ueintx.read().rxouti().bit_is_clear() {}
        usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
    }

    fn stall(&self) {
        self.dp
            .USB_DEVICE
            .ueconx
            .modify(|_, w| w.stallrq().set_bit());
    }
}

impl EventSink for UsbMidi<'_> {
    fn note_on(&mut self, note: u8, velocity: u8, channel: u8) {
        let status = 0x90 | (channel.wrapping_sub(1) & 0x0F);
        self.send_packet([CIN_NOTE_ON, status, note & 0x7F, velocity & 0x7F]);
    }

    fn note_off(&mut self, note: u8, velocity: u8, channel: u8) {
        let status = 0x80 | (channel.wrapping_sub(1) & 0x0F);
        self.send_packet([CIN_NOTE_OFF, status, note & 0x7F, velocity & 0x7F]);
    }
}

impl InboundDrain for UsbMidi<'_> {
    /// Drop one received bank from the OUT endpoint.
    fn discard_pending(&mut self) -> bool {
        if !self.configured {
            return false;
        }

        let usb = &self.dp.USB_DEVICE;
        self.select_endpoint(EP_OUT);
        if usb.ueintx.read().rxouti().bit_is_clear() {
            return false;
        }

        usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
        usb.ueintx.modify(|_, w| w.fifocon().clear_bit());
        true
    }
}
