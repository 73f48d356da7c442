//! Named view of a data frame response

use serde::Serialize;

/// One named byte of a data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataframeField {
    /// Field name from the layout table
    pub name: &'static str,
    /// Byte offset within the response
    pub offset: usize,
    /// Raw byte value, unconverted
    pub value: u8,
}

/// A data frame response (`0x7D` or `0x80`) split into its named fields.
///
/// Reserved bytes (empty names in the layout) are skipped. A short response
/// yields only the fields it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataframe {
    /// Opcode that produced the frame
    pub opcode: u8,
    /// Named fields in positional order
    pub fields: Vec<DataframeField>,
}

impl Dataframe {
    pub(crate) fn from_layout(opcode: u8, layout: &'static [&'static str], bytes: &[u8]) -> Self {
        let fields = layout
            .iter()
            .zip(bytes)
            .enumerate()
            .filter(|(_, (name, _))| !name.is_empty())
            .map(|(offset, (name, value))| DataframeField {
                name: *name,
                offset,
                value: *value,
            })
            .collect();

        Self { opcode, fields }
    }

    /// Raw value of a named field
    pub fn get(&self, name: &str) -> Option<u8> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value)
    }

    /// Big-endian 16-bit value assembled from `<base>_high_byte` and `<base>_low_byte`
    pub fn get_u16(&self, base: &str) -> Option<u16> {
        let high = self.get(&format!("{base}_high_byte"))?;
        let low = self.get(&format!("{base}_low_byte"))?;
        Some(u16::from_be_bytes([high, low]))
    }
}
