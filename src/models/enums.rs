use crate::history::HistoryError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = HistoryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(HistoryError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(CodingSystem {
    Icd10 => "icd10",
    Icd11 => "icd11",
    SnomedCt => "snomed_ct",
});

impl CodingSystem {
    /// All selectable coding systems, in presentation order.
    pub fn all() -> &'static [CodingSystem] {
        &[Self::Icd10, Self::Icd11, Self::SnomedCt]
    }

    /// Human-readable label for prompts and messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Icd10 => "ICD-10",
            Self::Icd11 => "ICD-11",
            Self::SnomedCt => "SNOMED CT",
        }
    }
}

str_enum!(ExtractionMode {
    Standard => "standard",
    Condense => "condense",
});
