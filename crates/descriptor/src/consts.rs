//! Wire-level USB constants
//!
//! Values here must match the USB 2.0 specification exactly; they are sent
//! to devices verbatim.

/// Descriptor type codes (bDescriptorType)
pub mod descriptor_type {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIG: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    pub const HID: u8 = 0x21;
    pub const REPORT: u8 = 0x22;
    pub const PHYSICAL: u8 = 0x23;
    pub const HUB: u8 = 0x29;
}

/// Standard request codes (bRequest)
pub mod request {
    pub const GET_STATUS: u8 = 0x00;
    pub const CLEAR_FEATURE: u8 = 0x01;
    pub const SET_FEATURE: u8 = 0x03;
    pub const SET_ADDRESS: u8 = 0x05;
    pub const GET_DESCRIPTOR: u8 = 0x06;
    pub const SET_DESCRIPTOR: u8 = 0x07;
    pub const GET_CONFIGURATION: u8 = 0x08;
    pub const SET_CONFIGURATION: u8 = 0x09;
    pub const GET_INTERFACE: u8 = 0x0A;
    pub const SET_INTERFACE: u8 = 0x0B;
    pub const SYNCH_FRAME: u8 = 0x0C;
}

/// USB class codes (bDeviceClass / bInterfaceClass)
pub mod class {
    pub const INTERFACE_SPECIFIC: u8 = 0x00;
    pub const AUDIO: u8 = 0x01;
    pub const CDC_CONTROL: u8 = 0x02;
    pub const HID: u8 = 0x03;
    pub const PHYSICAL: u8 = 0x05;
    pub const IMAGE: u8 = 0x06;
    pub const PRINTER: u8 = 0x07;
    pub const MASS_STORAGE: u8 = 0x08;
    pub const HUB: u8 = 0x09;
    pub const CDC_DATA: u8 = 0x0a;
    pub const SMART_CARD: u8 = 0x0b;
    pub const CONTENT_SECURITY: u8 = 0x0d;
    pub const VIDEO: u8 = 0x0e;
    pub const PERSONAL_HEALTHCARE: u8 = 0x0f;
    pub const AUDIO_VIDEO: u8 = 0x10;
    pub const BILLBOARD: u8 = 0x11;
    pub const USB_TYPE_C_BRIDGE: u8 = 0x12;
    pub const DIAGNOSTIC: u8 = 0xdc;
    pub const WIRELESS_CONTROLLER: u8 = 0xe0;
    pub const MISCELLANEOUS: u8 = 0xef;
    pub const APPLICATION_SPECIFIC: u8 = 0xfe;
    pub const VENDOR_SPECIFIC: u8 = 0xff;
}

/// Direction bit of endpoint addresses and bmRequestType
pub const ENDPOINT_DIR_MASK: u8 = 0x80;

/// Endpoint number bits of an endpoint address
pub const ENDPOINT_NUMBER_MASK: u8 = 0x0F;

/// Transfer type bits of an endpoint's bmAttributes
pub const TRANSFER_TYPE_MASK: u8 = 0x03;

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Device to host
    In = 0x80,
    /// Host to device
    Out = 0x00,
}

impl Direction {
    /// Direction encoded in bit 7 of an endpoint address or request type
    pub const fn from_bits(bits: u8) -> Self {
        if bits & ENDPOINT_DIR_MASK != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    /// Bit pattern for this direction
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Request category, bits 5-6 of bmRequestType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestKind {
    Standard = 0x00 << 5,
    Class = 0x01 << 5,
    Vendor = 0x02 << 5,
    Reserved = 0x03 << 5,
}

/// Request recipient, bits 0-1 of bmRequestType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Recipient {
    Device = 0x00,
    Interface = 0x01,
    Endpoint = 0x02,
    Other = 0x03,
}

/// Compose a bmRequestType byte
pub const fn request_type(direction: Direction, kind: RequestKind, recipient: Recipient) -> u8 {
    direction as u8 | kind as u8 | recipient as u8
}

/// Endpoint transfer type, bits 0-1 of bmAttributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

impl TransferType {
    /// Decode from an endpoint's bmAttributes (upper bits are ignored)
    pub const fn from_attributes(attributes: u8) -> Self {
        match attributes & TRANSFER_TYPE_MASK {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}
