//! VID:PID device filters
//!
//! Filters are written as `0xVID:0xPID`, where either side may be `*`:
//! `0x1234:0x5678`, `0x1234:*`, `*:*`.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One parsed `VID:PID` pattern, `None` meaning "any"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceFilter {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
}

impl DeviceFilter {
    /// Filter matching every device
    pub const ANY: DeviceFilter = DeviceFilter {
        vendor_id: None,
        product_id: None,
    };

    pub const fn new(vendor_id: Option<u16>, product_id: Option<u16>) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub fn parse(filter: &str) -> Result<Self> {
        let (vid, pid) = filter.split_once(':').ok_or_else(|| {
            Error::Config(format!(
                "Invalid filter format '{}', expected VID:PID (e.g., '0x1234:0x5678' or '0x1234:*')",
                filter
            ))
        })?;

        Ok(Self {
            vendor_id: parse_id(vid, "VID")?,
            product_id: parse_id(pid, "PID")?,
        })
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.is_none_or(|v| v == vendor_id)
            && self.product_id.is_none_or(|p| p == product_id)
    }

    /// True when `filters` is empty or any filter matches
    pub fn allows(filters: &[DeviceFilter], vendor_id: u16, product_id: u16) -> bool {
        filters.is_empty() || filters.iter().any(|f| f.matches(vendor_id, product_id))
    }
}

fn parse_id(id: &str, name: &str) -> Result<Option<u16>> {
    if id == "*" {
        return Ok(None);
    }

    let hex = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .ok_or_else(|| {
            Error::Config(format!(
                "Invalid {} '{}', must start with '0x' (e.g., '0x1234')",
                name, id
            ))
        })?;

    if hex.is_empty() || hex.len() > 4 {
        return Err(Error::Config(format!(
            "Invalid {} '{}', hex part must be 1-4 digits",
            name, id
        )));
    }

    u16::from_str_radix(hex, 16)
        .map(Some)
        .map_err(|_| Error::Config(format!("Invalid {} '{}', not a valid hex number", name, id)))
}

impl FromStr for DeviceFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor_id {
            Some(vid) => write!(f, "{:#06x}", vid)?,
            None => f.write_str("*")?,
        }
        f.write_str(":")?;
        match self.product_id {
            Some(pid) => write!(f, "{:#06x}", pid),
            None => f.write_str("*"),
        }
    }
}
