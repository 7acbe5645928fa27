//! The sequence-container model: an entry list plus base/restriction
//! inheritance, grounded on `xtce/definitions.py` and the container
//! processing pass in the `other_examples` XTCE prototype
//! (`proc/mod.rs`'s `ProcessorData`/evaluator construction).

use crate::match_criteria::MatchCriteria;

/// One item of a container's entry list: either a parameter to decode in
/// place, or a nested container whose own entry list is spliced in.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Parameter(String),
    Container(String),
}

/// A `<SequenceContainer>`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceContainer {
    pub name: String,
    pub entry_list: Vec<Entry>,
    pub base_container_name: Option<String>,
    pub restriction_criteria: Vec<MatchCriteria>,
    pub abstract_: bool,
    /// Populated by [`crate::definition::Definition`] after all containers
    /// are parsed, from every container naming this one as its base.
    pub inheritors: Vec<String>,
    pub short_description: Option<String>,
}

impl SequenceContainer {
    pub fn new(name: impl Into<String>) -> Self {
        SequenceContainer {
            name: name.into(),
            entry_list: Vec::new(),
            base_container_name: None,
            restriction_criteria: Vec::new(),
            abstract_: false,
            inheritors: Vec::new(),
            short_description: None,
        }
    }
}
