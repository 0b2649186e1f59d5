use serde::{Deserialize, Serialize};

pub(crate) const UNDEFINED: &str = "undefined";

/// Metadata for one result column, in result-column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub native_type: String,
    pub size: Option<i64>,
}

impl ColumnInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
            size: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    /// Placeholder used when the driver cannot describe a column.
    #[must_use]
    pub fn undefined() -> Self {
        Self::new(UNDEFINED, UNDEFINED)
    }

    /// Text value of one attribute, as read by `get_col_info`.
    #[must_use]
    pub fn attr(&self, attr: ColumnAttr) -> Option<String> {
        match attr {
            ColumnAttr::Name => Some(self.name.clone()),
            ColumnAttr::NativeType => Some(self.native_type.clone()),
            ColumnAttr::Size => self.size.map(|s| s.to_string()),
        }
    }
}

impl Default for ColumnInfo {
    fn default() -> Self {
        Self::undefined()
    }
}

/// Column attribute selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAttr {
    Name,
    NativeType,
    Size,
}
