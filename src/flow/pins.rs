use serde::{Deserialize, Serialize};

pub const SEQ_IN: &str = "@seqin";
pub const SEQ_OUT: &str = "@seqout";

/// Type of pure control-flow pins.
pub const SEQUENCE_TYPE: &str = "null";
/// Matches every other type when wires are checked.
pub const ANY_TYPE: &str = "any";

/// Declaration of one input or output pin of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSpec {
    pub name: String,
    pub display_name: Option<String>,
    pub value_type: String,
    pub optional: bool,
    /// Sequence inputs trigger execution; sequence outputs drive control flow.
    pub sequence: bool,
}

impl PinSpec {
    pub fn sequence(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            value_type: SEQUENCE_TYPE.to_string(),
            optional: false,
            sequence: true,
        }
    }

    pub fn data(name: &str, value_type: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            value_type: value_type.to_string(),
            optional: false,
            sequence: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn typed(mut self, value_type: &str) -> Self {
        self.value_type = value_type.to_string();
        self
    }

    pub fn labelled(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_string());
        self
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// `any` on either side matches, and a pure sequence output may drive any input.
pub fn types_compatible(source: &str, target: &str) -> bool {
    source == target
        || source == ANY_TYPE
        || target == ANY_TYPE
        || source == SEQUENCE_TYPE
        || target == SEQUENCE_TYPE
}
