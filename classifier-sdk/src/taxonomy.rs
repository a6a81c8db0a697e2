//! Category taxonomy and sentinel codes
//!
//! The taxonomy is the closed set of root-cause labels a complaint can be
//! assigned. Sentinels are reserved category strings that mark a failure
//! instead of a classification; their exact values are part of the output
//! contract, so downstream filters keep working across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed list of root-cause labels, in the order they are presented to the model
const LABELS: [&str; 11] = [
    "Servicio Operativo y Frecuencia",
    "Infraestructura y Mantenimiento",
    "Seguridad y Control",
    "Atención al Usuario",
    "Otros",
    "Conducta de Terceros",
    "Incidentes y Emergencias",
    "Accesibilidad y Público Vulnerable",
    "Personal y Desempeño Laboral",
    "Ambiente y Confort",
    "Tarifas y Boletos",
];

/// Process-wide taxonomy shared by every classification call
pub static TAXONOMY: Taxonomy = Taxonomy { labels: &LABELS };

/// A closed, read-only set of category labels
#[derive(Debug, Clone, Copy)]
pub struct Taxonomy {
    labels: &'static [&'static str],
}

impl Taxonomy {
    /// All labels in presentation order
    pub fn labels(&self) -> &'static [&'static str] {
        self.labels
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the taxonomy has no labels
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Exact membership check
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(&label)
    }

    /// Map a model-produced label onto its canonical spelling.
    ///
    /// Models tend to decorate labels with quotes, markdown emphasis or a
    /// closing period, and do not always respect capitalisation. Those are
    /// stripped before a case-insensitive comparison.
    pub fn resolve(&self, raw: &str) -> Option<&'static str> {
        let cleaned = raw.trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '"' | '\'' | '*' | '`' | '.')
        });

        if cleaned.is_empty() {
            return None;
        }

        let wanted = cleaned.to_lowercase();
        self.labels
            .iter()
            .copied()
            .find(|label| label.to_lowercase() == wanted)
    }

    /// Render the labels as a bulleted list for prompts
    pub fn as_bullet_list(&self) -> String {
        self.labels
            .iter()
            .map(|label| format!("- {}", label))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reserved category values signalling a failure kind rather than a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentinel {
    /// Generic or unexpected failure while classifying a single item
    #[serde(rename = "ERROR_GENERAL")]
    General,
    /// Backend call failed after all retries, or a batch call failed outright
    #[serde(rename = "ERROR_API")]
    Api,
    /// Response could not be parsed into the expected structure
    #[serde(rename = "ERROR_FORMATO")]
    Format,
    /// Response could not be decoded as JSON
    #[serde(rename = "ERROR_JSON")]
    Json,
    /// An entire chunk failed during dispatch
    #[serde(rename = "ERROR_LOTE")]
    Batch,
    /// Row was never attempted (early stop, cancellation, or omitted by the backend)
    #[serde(rename = "NO_CLASIFICADO")]
    NotClassified,
    /// Row had no text and was not submitted
    #[serde(rename = "SIN_TEXTO")]
    Empty,
}

impl Sentinel {
    /// Every sentinel, useful for filters
    pub const ALL: [Sentinel; 7] = [
        Sentinel::General,
        Sentinel::Api,
        Sentinel::Format,
        Sentinel::Json,
        Sentinel::Batch,
        Sentinel::NotClassified,
        Sentinel::Empty,
    ];

    /// The exact string written into the category column
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentinel::General => "ERROR_GENERAL",
            Sentinel::Api => "ERROR_API",
            Sentinel::Format => "ERROR_FORMATO",
            Sentinel::Json => "ERROR_JSON",
            Sentinel::Batch => "ERROR_LOTE",
            Sentinel::NotClassified => "NO_CLASIFICADO",
            Sentinel::Empty => "SIN_TEXTO",
        }
    }

    /// Recognise a category string as a sentinel
    pub fn parse(value: &str) -> Option<Sentinel> {
        Self::ALL.iter().copied().find(|s| s.as_str() == value)
    }

    /// Whether this sentinel counts as a failure for run bookkeeping.
    ///
    /// Blank rows are skipped, not failed.
    pub fn is_error(&self) -> bool {
        !matches!(self, Sentinel::Empty)
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
