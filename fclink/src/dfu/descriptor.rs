//! Parser for one `dfu-util --list` device line.
//!
//! A line looks like this once the `Found DFU: ` prefix is stripped:
//!
//! ```text
//! [0483:df11] ver=2200, devnum=17, cfg=1, intf=0, path="20-1", alt=0,
//!     name="@Internal Flash  /0x08000000/04*016Kg,01*064Kg,07*128Kg", serial="3276365D3336"
//! ```

use {
    super::INTERNAL_FLASH_MARKER,
    crate::error::{Error, Result},
    std::fmt,
};

/// Flash parameters of one bootloader interface.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DfuDescriptor {
    /// Alternate setting to flash through.
    pub alt: u8,
    /// USB serial number of the device.
    pub serial: String,
    /// Internal flash start address, as printed (e.g. `0x08000000`).
    pub offset: String,
}

impl DfuDescriptor {
    /// Whether a listing line describes an internal flash interface.
    pub fn is_internal_flash(line: &str) -> bool {
        line.contains(INTERNAL_FLASH_MARKER)
    }

    /// Parse a listing line.
    pub fn parse(line: &str) -> Result<Self> {
        let missing = |field| Error::Descriptor {
            field,
            line: line.to_string(),
        };

        let alt = after(line, "alt=")
            .map(|rest| take_while(rest, |c| c.is_ascii_digit()))
            .filter(|digits| !digits.is_empty())
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| missing("alt"))?;

        let serial = after(line, "serial=\"")
            .and_then(|rest| rest.split_once('"'))
            .map(|(serial, _)| serial)
            .filter(|serial| !serial.is_empty())
            .ok_or_else(|| missing("serial"))?;

        let offset = after(line, INTERNAL_FLASH_MARKER)
            .and_then(|rest| rest.split_once('/'))
            .map(|(offset, _)| offset)
            .filter(|offset| !offset.is_empty() && !offset.contains(char::is_whitespace))
            .ok_or_else(|| missing("offset"))?;

        Ok(Self {
            alt,
            serial: serial.to_string(),
            offset: offset.to_string(),
        })
    }

    /// Arguments for `dfu-util` to write `binary` and leave DFU mode.
    pub fn flash_args(&self, binary: &str) -> Vec<String> {
        vec![
            "-a".into(),
            self.alt.to_string(),
            "-S".into(),
            self.serial.clone(),
            "-s".into(),
            format!("{}:leave", self.offset),
            "-D".into(),
            binary.into(),
        ]
    }
}

impl fmt::Display for DfuDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "serial {} alt {} @ {}",
            self.serial, self.alt, self.offset
        )
    }
}

fn after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.find(key)
        .map(|pos| &line[pos + key.len()..])
}

fn take_while(s: &str, pred: impl Fn(char) -> bool) -> &str {
    let end = s
        .find(|c| !pred(c))
        .unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = r#"[0483:df11] ver=2200, devnum=17, cfg=1, intf=0, path="20-1", alt=0, name="@Internal Flash  /0x08000000/04*016Kg,01*064Kg,07*128Kg", serial="3276365D3336""#;

    fn missing_field(line: &str) -> &'static str {
        match DfuDescriptor::parse(line) {
            Err(Error::Descriptor { field, line: l }) => {
                assert_eq!(l, line);
                field
            },
            other => panic!("expected descriptor error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_reference_line() {
        assert!(DfuDescriptor::is_internal_flash(REFERENCE));
        let descriptor = DfuDescriptor::parse(REFERENCE).unwrap();
        assert_eq!(
            descriptor,
            DfuDescriptor {
                alt: 0,
                serial: "3276365D3336".into(),
                offset: "0x08000000".into(),
            }
        );
    }

    #[test]
    fn test_flash_args() {
        let descriptor = DfuDescriptor::parse(REFERENCE).unwrap();
        assert_eq!(
            descriptor.flash_args("obj/inav_1.9.0_SPRACINGF3.bin"),
            [
                "-a",
                "0",
                "-S",
                "3276365D3336",
                "-s",
                "0x08000000:leave",
                "-D",
                "obj/inav_1.9.0_SPRACINGF3.bin"
            ]
        );
    }

    #[test]
    fn test_parse_multi_digit_alt() {
        let line = REFERENCE.replace("alt=0", "alt=12");
        assert_eq!(DfuDescriptor::parse(&line).unwrap().alt, 12);
    }

    #[test]
    fn test_parse_offset_with_hex_letters() {
        let line = r#"[0483:df11] ver=2200, alt=0, name="@Internal Flash  /0x0800C000/04*016Kg", serial="3276365D3336""#;
        assert_eq!(DfuDescriptor::parse(line).unwrap().offset, "0x0800C000");

        let upper = REFERENCE.replace("/0x08000000/", "/0X0801FFFF/");
        let descriptor = DfuDescriptor::parse(&upper).unwrap();
        assert_eq!(descriptor.offset, "0X0801FFFF");
        assert_eq!(descriptor.flash_args("fw.bin")[5], "0X0801FFFF:leave");
    }

    #[test]
    fn test_missing_fields_are_named() {
        assert_eq!(missing_field(&REFERENCE.replace("alt=0", "alt=")), "alt");
        assert_eq!(missing_field(&REFERENCE.replace("alt=0, ", "")), "alt");
        assert_eq!(
            missing_field(&REFERENCE.replace("serial=\"3276365D3336\"", "serial=\"\"")),
            "serial"
        );
        assert_eq!(
            missing_field(&REFERENCE.replace("/0x08000000/", "/")),
            "offset"
        );
        assert_eq!(
            missing_field(
                r#"[0483:df11] alt=1, name="@Option Bytes  /0x1FFFF800/01*016 e", serial="X""#
            ),
            "offset"
        );
    }

    #[test]
    fn test_option_bytes_line_is_not_internal_flash() {
        assert!(!DfuDescriptor::is_internal_flash(
            r#"[0483:df11] ver=2200, devnum=17, cfg=1, intf=0, path="20-1", alt=1, name="@Option Bytes  /0x1FFFF800/01*016 e", serial="3276365D3336""#
        ));
    }
}
