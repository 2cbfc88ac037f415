//! Typed descriptor records
//!
//! Fixed-size descriptors keep their raw bytes and expose fields through
//! accessors backed by a layout table, so the same table drives decoding,
//! field access and the human-readable dump.

use crate::codec::{DESCRIPTOR_TYPE, Field, LENGTH, Record, Width};
use crate::consts::{
    Direction, ENDPOINT_DIR_MASK, ENDPOINT_NUMBER_MASK, TransferType, descriptor_type,
};
use crate::error::{ParseError, Result};
use std::fmt;

/// Size of a device descriptor
pub const DEVICE_DESCRIPTOR_SIZE: usize = 18;
/// Size of a configuration descriptor
pub const CONFIG_DESCRIPTOR_SIZE: usize = 9;
/// Size of an interface descriptor
pub const INTERFACE_DESCRIPTOR_SIZE: usize = 9;
/// Size of an endpoint descriptor
pub const ENDPOINT_DESCRIPTOR_SIZE: usize = 7;
/// Size of the bLength/bDescriptorType header shared by all descriptors
pub const HEADER_SIZE: usize = 2;

/// Capabilities shared by every descriptor
pub trait UsbDescriptor {
    /// Total length in bytes, as declared by bLength
    fn length(&self) -> usize;

    /// Descriptor type code (bDescriptorType)
    fn descriptor_type(&self) -> u8;
}

/// A parsed descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Device(DeviceDescriptor),
    Configuration(ConfigurationDescriptor),
    Interface(InterfaceDescriptor),
    Endpoint(EndpointDescriptor),
    String(StringDescriptor),
}

impl UsbDescriptor for Descriptor {
    fn length(&self) -> usize {
        match self {
            Descriptor::Device(d) => d.length(),
            Descriptor::Configuration(d) => d.length(),
            Descriptor::Interface(d) => d.length(),
            Descriptor::Endpoint(d) => d.length(),
            Descriptor::String(d) => d.length(),
        }
    }

    fn descriptor_type(&self) -> u8 {
        match self {
            Descriptor::Device(d) => d.descriptor_type(),
            Descriptor::Configuration(d) => d.descriptor_type(),
            Descriptor::Interface(d) => d.descriptor_type(),
            Descriptor::Endpoint(d) => d.descriptor_type(),
            Descriptor::String(d) => d.descriptor_type(),
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Device(d) => d.fmt(f),
            Descriptor::Configuration(d) => d.fmt(f),
            Descriptor::Interface(d) => d.fmt(f),
            Descriptor::Endpoint(d) => d.fmt(f),
            Descriptor::String(d) => d.fmt(f),
        }
    }
}

/// Split off bLength and bDescriptorType
pub(crate) fn header(buf: &[u8]) -> Result<(usize, u8)> {
    match buf {
        &[length, descriptor_type, ..] => Ok((usize::from(length), descriptor_type)),
        _ => Err(ParseError::TruncatedHeader),
    }
}

/// Copy out a fixed-size descriptor after checking its declared length
fn fixed<const N: usize>(buf: &[u8]) -> Result<[u8; N]> {
    let (declared, descriptor_type) = header(buf)?;
    if buf.len() < declared {
        return Err(ParseError::TruncatedBody {
            declared,
            available: buf.len(),
        });
    }
    if declared != N {
        return Err(ParseError::LengthMismatch {
            descriptor_type,
            expected: N,
            actual: declared,
        });
    }

    let mut raw = [0u8; N];
    raw.copy_from_slice(&buf[..N]);
    Ok(raw)
}

fn write_layout(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    record: Record<'_>,
    layout: &[Field],
) -> fmt::Result {
    writeln!(f, "{}:", title)?;
    for field in layout {
        match field.width {
            Width::Byte => writeln!(f, "  {:<20} {:>6}", field.name, record.byte(*field))?,
            Width::Word => writeln!(f, "  {:<20} {:#06x}", field.name, record.word(*field))?,
        }
    }
    Ok(())
}

/// Standard device descriptor (USB 2.0 §9.6.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    raw: [u8; DEVICE_DESCRIPTOR_SIZE],
}

impl DeviceDescriptor {
    const BCD_USB: Field = Field::word("bcdUSB", 2);
    const DEVICE_CLASS: Field = Field::byte("bDeviceClass", 4);
    const DEVICE_SUB_CLASS: Field = Field::byte("bDeviceSubClass", 5);
    const DEVICE_PROTOCOL: Field = Field::byte("bDeviceProtocol", 6);
    const MAX_PACKET_SIZE_0: Field = Field::byte("bMaxPacketSize0", 7);
    const ID_VENDOR: Field = Field::word("idVendor", 8);
    const ID_PRODUCT: Field = Field::word("idProduct", 10);
    const BCD_DEVICE: Field = Field::word("bcdDevice", 12);
    const I_MANUFACTURER: Field = Field::byte("iManufacturer", 14);
    const I_PRODUCT: Field = Field::byte("iProduct", 15);
    const I_SERIAL_NUMBER: Field = Field::byte("iSerialNumber", 16);
    const NUM_CONFIGURATIONS: Field = Field::byte("bNumConfigurations", 17);

    /// Field layout, in wire order
    pub const LAYOUT: &'static [Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        Self::BCD_USB,
        Self::DEVICE_CLASS,
        Self::DEVICE_SUB_CLASS,
        Self::DEVICE_PROTOCOL,
        Self::MAX_PACKET_SIZE_0,
        Self::ID_VENDOR,
        Self::ID_PRODUCT,
        Self::BCD_DEVICE,
        Self::I_MANUFACTURER,
        Self::I_PRODUCT,
        Self::I_SERIAL_NUMBER,
        Self::NUM_CONFIGURATIONS,
    ];

    pub(crate) fn decode(buf: &[u8]) -> Result<Self> {
        fixed(buf).map(|raw| Self { raw })
    }

    fn record(&self) -> Record<'_> {
        Record::of(&self.raw)
    }

    /// Raw descriptor bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// USB specification release (BCD)
    pub fn bcd_usb(&self) -> u16 {
        self.record().word(Self::BCD_USB)
    }

    pub fn class_code(&self) -> u8 {
        self.record().byte(Self::DEVICE_CLASS)
    }

    pub fn sub_class_code(&self) -> u8 {
        self.record().byte(Self::DEVICE_SUB_CLASS)
    }

    pub fn protocol_code(&self) -> u8 {
        self.record().byte(Self::DEVICE_PROTOCOL)
    }

    /// Maximum packet size of the default control endpoint
    pub fn max_packet_size(&self) -> u8 {
        self.record().byte(Self::MAX_PACKET_SIZE_0)
    }

    pub fn vendor_id(&self) -> u16 {
        self.record().word(Self::ID_VENDOR)
    }

    pub fn product_id(&self) -> u16 {
        self.record().word(Self::ID_PRODUCT)
    }

    /// Device release number (BCD)
    pub fn bcd_device(&self) -> u16 {
        self.record().word(Self::BCD_DEVICE)
    }

    /// String index of the manufacturer name, 0 if absent
    pub fn manufacturer_string_index(&self) -> u8 {
        self.record().byte(Self::I_MANUFACTURER)
    }

    /// String index of the product name, 0 if absent
    pub fn product_string_index(&self) -> u8 {
        self.record().byte(Self::I_PRODUCT)
    }

    /// String index of the serial number, 0 if absent
    pub fn serial_number_string_index(&self) -> u8 {
        self.record().byte(Self::I_SERIAL_NUMBER)
    }

    pub fn num_configurations(&self) -> u8 {
        self.record().byte(Self::NUM_CONFIGURATIONS)
    }

    /// Exact match on vendor and product ID
    pub fn matches_identity(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id() == vendor_id && self.product_id() == product_id
    }
}

impl UsbDescriptor for DeviceDescriptor {
    fn length(&self) -> usize {
        usize::from(self.record().byte(LENGTH))
    }

    fn descriptor_type(&self) -> u8 {
        self.record().byte(DESCRIPTOR_TYPE)
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_layout(f, "Device Descriptor", self.record(), Self::LAYOUT)
    }
}

/// Standard configuration descriptor (USB 2.0 §9.6.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigurationDescriptor {
    raw: [u8; CONFIG_DESCRIPTOR_SIZE],
}

impl ConfigurationDescriptor {
    const TOTAL_LENGTH: Field = Field::word("wTotalLength", 2);
    const NUM_INTERFACES: Field = Field::byte("bNumInterfaces", 4);
    const CONFIGURATION_VALUE: Field = Field::byte("bConfigurationValue", 5);
    const I_CONFIGURATION: Field = Field::byte("iConfiguration", 6);
    const ATTRIBUTES: Field = Field::byte("bmAttributes", 7);
    const MAX_POWER: Field = Field::byte("bMaxPower", 8);

    /// Field layout, in wire order
    pub const LAYOUT: &'static [Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        Self::TOTAL_LENGTH,
        Self::NUM_INTERFACES,
        Self::CONFIGURATION_VALUE,
        Self::I_CONFIGURATION,
        Self::ATTRIBUTES,
        Self::MAX_POWER,
    ];

    pub(crate) fn decode(buf: &[u8]) -> Result<Self> {
        fixed(buf).map(|raw| Self { raw })
    }

    fn record(&self) -> Record<'_> {
        Record::of(&self.raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Length of the whole configuration block, including the interface,
    /// endpoint and class-specific descriptors that follow this one
    pub fn total_length(&self) -> u16 {
        self.record().word(Self::TOTAL_LENGTH)
    }

    pub fn num_interfaces(&self) -> u8 {
        self.record().byte(Self::NUM_INTERFACES)
    }

    /// Value to pass to SET_CONFIGURATION to select this configuration
    pub fn configuration_value(&self) -> u8 {
        self.record().byte(Self::CONFIGURATION_VALUE)
    }

    pub fn configuration_string_index(&self) -> u8 {
        self.record().byte(Self::I_CONFIGURATION)
    }

    pub fn attributes(&self) -> u8 {
        self.record().byte(Self::ATTRIBUTES)
    }

    /// Maximum power draw in 2 mA units (8 mA units for SuperSpeed)
    pub fn max_power(&self) -> u8 {
        self.record().byte(Self::MAX_POWER)
    }

    pub fn self_powered(&self) -> bool {
        self.attributes() & 0x40 != 0
    }

    pub fn remote_wakeup(&self) -> bool {
        self.attributes() & 0x20 != 0
    }
}

impl UsbDescriptor for ConfigurationDescriptor {
    fn length(&self) -> usize {
        usize::from(self.record().byte(LENGTH))
    }

    fn descriptor_type(&self) -> u8 {
        self.record().byte(DESCRIPTOR_TYPE)
    }
}

impl fmt::Display for ConfigurationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_layout(f, "Configuration Descriptor", self.record(), Self::LAYOUT)
    }
}

/// Standard interface descriptor (USB 2.0 §9.6.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceDescriptor {
    raw: [u8; INTERFACE_DESCRIPTOR_SIZE],
}

impl InterfaceDescriptor {
    const INTERFACE_NUMBER: Field = Field::byte("bInterfaceNumber", 2);
    const ALTERNATE_SETTING: Field = Field::byte("bAlternateSetting", 3);
    const NUM_ENDPOINTS: Field = Field::byte("bNumEndpoints", 4);
    const INTERFACE_CLASS: Field = Field::byte("bInterfaceClass", 5);
    const INTERFACE_SUB_CLASS: Field = Field::byte("bInterfaceSubClass", 6);
    const INTERFACE_PROTOCOL: Field = Field::byte("bInterfaceProtocol", 7);
    const I_INTERFACE: Field = Field::byte("iInterface", 8);

    /// Field layout, in wire order
    pub const LAYOUT: &'static [Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        Self::INTERFACE_NUMBER,
        Self::ALTERNATE_SETTING,
        Self::NUM_ENDPOINTS,
        Self::INTERFACE_CLASS,
        Self::INTERFACE_SUB_CLASS,
        Self::INTERFACE_PROTOCOL,
        Self::I_INTERFACE,
    ];

    pub(crate) fn decode(buf: &[u8]) -> Result<Self> {
        fixed(buf).map(|raw| Self { raw })
    }

    fn record(&self) -> Record<'_> {
        Record::of(&self.raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn interface_number(&self) -> u8 {
        self.record().byte(Self::INTERFACE_NUMBER)
    }

    pub fn alternate_setting(&self) -> u8 {
        self.record().byte(Self::ALTERNATE_SETTING)
    }

    /// Number of endpoints, excluding endpoint 0
    pub fn num_endpoints(&self) -> u8 {
        self.record().byte(Self::NUM_ENDPOINTS)
    }

    pub fn class_code(&self) -> u8 {
        self.record().byte(Self::INTERFACE_CLASS)
    }

    pub fn sub_class_code(&self) -> u8 {
        self.record().byte(Self::INTERFACE_SUB_CLASS)
    }

    pub fn protocol_code(&self) -> u8 {
        self.record().byte(Self::INTERFACE_PROTOCOL)
    }

    pub fn interface_string_index(&self) -> u8 {
        self.record().byte(Self::I_INTERFACE)
    }
}

impl UsbDescriptor for InterfaceDescriptor {
    fn length(&self) -> usize {
        usize::from(self.record().byte(LENGTH))
    }

    fn descriptor_type(&self) -> u8 {
        self.record().byte(DESCRIPTOR_TYPE)
    }
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_layout(f, "Interface Descriptor", self.record(), Self::LAYOUT)
    }
}

/// Standard endpoint descriptor (USB 2.0 §9.6.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointDescriptor {
    raw: [u8; ENDPOINT_DESCRIPTOR_SIZE],
}

impl EndpointDescriptor {
    const ENDPOINT_ADDRESS: Field = Field::byte("bEndpointAddress", 2);
    const ATTRIBUTES: Field = Field::byte("bmAttributes", 3);
    const MAX_PACKET_SIZE: Field = Field::word("wMaxPacketSize", 4);
    const INTERVAL: Field = Field::byte("bInterval", 6);

    /// Field layout, in wire order
    pub const LAYOUT: &'static [Field] = &[
        LENGTH,
        DESCRIPTOR_TYPE,
        Self::ENDPOINT_ADDRESS,
        Self::ATTRIBUTES,
        Self::MAX_PACKET_SIZE,
        Self::INTERVAL,
    ];

    pub(crate) fn decode(buf: &[u8]) -> Result<Self> {
        fixed(buf).map(|raw| Self { raw })
    }

    fn record(&self) -> Record<'_> {
        Record::of(&self.raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Full bEndpointAddress, direction bit included
    pub fn address(&self) -> u8 {
        self.record().byte(Self::ENDPOINT_ADDRESS)
    }

    pub fn attributes(&self) -> u8 {
        self.record().byte(Self::ATTRIBUTES)
    }

    pub fn max_packet_size(&self) -> u16 {
        self.record().word(Self::MAX_PACKET_SIZE)
    }

    /// Polling interval, in frames or microframes depending on speed
    pub fn interval(&self) -> u8 {
        self.record().byte(Self::INTERVAL)
    }

    /// Endpoint number (bits 0-3 of the address)
    pub fn number(&self) -> u8 {
        self.address() & ENDPOINT_NUMBER_MASK
    }

    /// Direction bit of the address, 0x80 for IN and 0x00 for OUT
    pub fn direction_bits(&self) -> u8 {
        self.address() & ENDPOINT_DIR_MASK
    }

    pub fn direction(&self) -> Direction {
        Direction::from_bits(self.address())
    }

    pub fn transfer_type(&self) -> TransferType {
        TransferType::from_attributes(self.attributes())
    }
}

impl UsbDescriptor for EndpointDescriptor {
    fn length(&self) -> usize {
        usize::from(self.record().byte(LENGTH))
    }

    fn descriptor_type(&self) -> u8 {
        self.record().byte(DESCRIPTOR_TYPE)
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_layout(f, "Endpoint Descriptor", self.record(), Self::LAYOUT)
    }
}

/// String descriptor as found inside a descriptor block
///
/// The payload is kept as raw bytes. [`StringDescriptor::text`] reads it one
/// byte per character and does not decode UTF-16; decoding belongs to the
/// string-descriptor fetch path, which knows the payload is UTF-16LE.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringDescriptor {
    length: u8,
    payload: Vec<u8>,
}

impl StringDescriptor {
    pub(crate) fn decode(buf: &[u8]) -> Result<Self> {
        let (declared, descriptor_type) = header(buf)?;
        if buf.len() < declared {
            return Err(ParseError::TruncatedBody {
                declared,
                available: buf.len(),
            });
        }
        if declared < HEADER_SIZE {
            return Err(ParseError::LengthMismatch {
                descriptor_type,
                expected: HEADER_SIZE,
                actual: declared,
            });
        }

        Ok(Self {
            length: buf[0],
            payload: buf[HEADER_SIZE..declared].to_vec(),
        })
    }

    /// Payload bytes following the two-byte header
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload read as 8-bit units, one character per byte
    pub fn text(&self) -> String {
        self.payload.iter().map(|&b| char::from(b)).collect()
    }
}

impl UsbDescriptor for StringDescriptor {
    fn length(&self) -> usize {
        usize::from(self.length)
    }

    fn descriptor_type(&self) -> u8 {
        descriptor_type::STRING
    }
}

impl fmt::Display for StringDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "String Descriptor:")?;
        writeln!(f, "  {:<20} {:>6}", LENGTH.name, self.length)?;
        writeln!(f, "  {:<20} {:>6}", DESCRIPTOR_TYPE.name, descriptor_type::STRING)?;
        writeln!(f, "  {:<20} {:?}", "payload", self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::layout_size;

    #[test]
    fn test_layouts_cover_fixed_sizes() {
        assert_eq!(layout_size(DeviceDescriptor::LAYOUT), DEVICE_DESCRIPTOR_SIZE);
        assert_eq!(
            layout_size(ConfigurationDescriptor::LAYOUT),
            CONFIG_DESCRIPTOR_SIZE
        );
        assert_eq!(
            layout_size(InterfaceDescriptor::LAYOUT),
            INTERFACE_DESCRIPTOR_SIZE
        );
        assert_eq!(
            layout_size(EndpointDescriptor::LAYOUT),
            ENDPOINT_DESCRIPTOR_SIZE
        );
    }

    #[test]
    fn test_layouts_are_contiguous() {
        for layout in [
            DeviceDescriptor::LAYOUT,
            ConfigurationDescriptor::LAYOUT,
            InterfaceDescriptor::LAYOUT,
            EndpointDescriptor::LAYOUT,
        ] {
            let mut next = 0;
            for field in layout {
                assert_eq!(field.offset, next, "gap before {}", field.name);
                next = field.end();
            }
        }
    }

    #[test]
    fn test_header_requires_two_bytes() {
        assert_eq!(header(&[]), Err(ParseError::TruncatedHeader));
        assert_eq!(header(&[0x09]), Err(ParseError::TruncatedHeader));
        assert_eq!(header(&[0x09, 0x02]), Ok((9, 0x02)));
    }

    #[test]
    fn test_fixed_copies_declared_bytes_only() {
        let buf = [0x07, 0x05, 0x81, 0x02, 0x40, 0x00, 0x01, 0xFF, 0xFF];
        assert_eq!(fixed::<7>(&buf), Ok([0x07, 0x05, 0x81, 0x02, 0x40, 0x00, 0x01]));
        assert_eq!(
            fixed::<7>(&buf[..6]),
            Err(ParseError::TruncatedBody {
                declared: 7,
                available: 6,
            })
        );
        assert!(matches!(
            fixed::<9>(&buf),
            Err(ParseError::LengthMismatch { expected: 9, actual: 7, .. })
        ));
    }

    #[test]
    fn test_configuration_attribute_bits() {
        let desc =
            ConfigurationDescriptor::decode(&[0x09, 0x02, 0x20, 0x00, 0x01, 0x01, 0x00, 0xE0, 0x32])
                .unwrap();
        assert!(desc.self_powered());
        assert!(desc.remote_wakeup());
        assert_eq!(desc.max_power(), 0x32);
    }

    #[test]
    fn test_string_text_is_bytewise() {
        let desc = StringDescriptor::decode(&[0x06, 0x03, 0x41, 0x00, 0xE9, 0x00]).unwrap();
        assert_eq!(desc.text(), "A\u{0}\u{e9}\u{0}");
        assert_eq!(desc.payload(), &[0x41, 0x00, 0xE9, 0x00]);
    }

    #[test]
    fn test_display_lists_every_field() {
        let desc = EndpointDescriptor::decode(&[0x07, 0x05, 0x81, 0x02, 0x00, 0x02, 0x00]).unwrap();
        let dump = desc.to_string();
        for field in EndpointDescriptor::LAYOUT {
            assert!(dump.contains(field.name), "missing {}", field.name);
        }
        assert!(dump.contains("0x0200"));
    }
}
