use once_cell::sync::Lazy;
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};

/// Periodic report forms whose XBRL packages are harvested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum FormType {
    Form10K,
    Form10Q,
    Form20F,
    Form40F,
}

impl FormType {
    /// Lower-case code, used for the per-form directory and the ledger column.
    pub fn dir_name(&self) -> String {
        self.to_string().to_lowercase()
    }

    pub fn list_types() -> &'static str {
        &FORM_TYPES
    }
}

pub static FORM_TYPES: Lazy<String> = Lazy::new(|| {
    FormType::iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
});

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormType::Form10K => write!(f, "10-K"),
            FormType::Form10Q => write!(f, "10-Q"),
            FormType::Form20F => write!(f, "20-F"),
            FormType::Form40F => write!(f, "40-F"),
        }
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<FormType, String> {
        match s.trim().to_uppercase().as_str() {
            "10-K" => Ok(FormType::Form10K),
            "10-Q" => Ok(FormType::Form10Q),
            "20-F" => Ok(FormType::Form20F),
            "40-F" => Ok(FormType::Form40F),
            _ => Err(format!(
                "Unsupported form type '{}', expected one of: {}",
                s,
                FormType::list_types()
            )),
        }
    }
}
