//! State accumulated while one target is generated.
//!
//! A [`GenerationSession`] is owned by exactly one generation pass. Each step
//! receives it explicitly, records what it produced, and later steps read it
//! back: the link step reads the objects, the collation step reads the
//! dependency scan outputs, and the bundle step reads the content folders.

use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::GenError;
use crate::hasher::RuleHasher;
use crate::ir::Rule;
use crate::model::Language;
use crate::sink::NinjaSink;

/// Per-target generation state.
#[derive(Debug, Default)]
pub struct GenerationSession {
    target: String,
    objects: Vec<Utf8PathBuf>,
    claimed_objects: HashSet<Utf8PathBuf>,
    ddi_files: IndexMap<Language, Vec<Utf8PathBuf>>,
    mac_content_folders: IndexSet<Utf8PathBuf>,
    custom_outputs: Vec<Utf8PathBuf>,
    emitted_rules: HashMap<String, String>,
}

impl GenerationSession {
    /// Start a session for `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Name of the target being generated.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Emit `rule` unless an identical rule was already emitted.
    ///
    /// Returns whether the rule was written.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ConflictingRule`] when a different rule was
    /// emitted under the same name, or [`GenError::Sink`] when the sink
    /// rejects the write.
    pub fn emit_rule(&mut self, sink: &mut dyn NinjaSink, rule: &Rule) -> Result<bool, GenError> {
        let digest = RuleHasher::hash(rule);
        match self.emitted_rules.get(&rule.name) {
            Some(existing) if *existing == digest => return Ok(false),
            Some(_) => {
                return Err(GenError::ConflictingRule {
                    target: self.target.clone(),
                    rule: rule.name.clone(),
                });
            }
            None => {}
        }
        sink.write_rule(rule).map_err(|source| GenError::Sink {
            target: self.target.clone(),
            stream: "rules",
            source,
        })?;
        debug!(target_name = %self.target, rule = %rule.name, "emitted rule");
        self.emitted_rules.insert(rule.name.clone(), digest);
        Ok(true)
    }

    /// Whether a rule named `name` has been emitted.
    #[must_use]
    pub fn has_rule(&self, name: &str) -> bool {
        self.emitted_rules.contains_key(name)
    }

    /// Reserve an object or preprocessed output path for a source. Returns
    /// `false` if it is taken.
    pub fn claim_object(&mut self, object: &Utf8Path) -> bool {
        self.claimed_objects.insert(object.to_path_buf())
    }

    /// Record an object produced by a build statement.
    pub fn add_object(&mut self, object: Utf8PathBuf) {
        self.objects.push(object);
    }

    /// Objects in source order.
    #[must_use]
    pub fn objects(&self) -> &[Utf8PathBuf] {
        &self.objects
    }

    /// Record a dependency scan output for `language`.
    pub fn add_ddi_file(&mut self, language: &Language, ddi: Utf8PathBuf) {
        self.ddi_files.entry(language.clone()).or_default().push(ddi);
    }

    /// Dependency scan outputs for `language`.
    #[must_use]
    pub fn ddi_files(&self, language: &Language) -> &[Utf8PathBuf] {
        self.ddi_files.get(language).map_or(&[], Vec::as_slice)
    }

    /// Mark a bundle folder as handled. Returns `true` the first time.
    pub fn add_mac_content_folder(&mut self, folder: &Utf8Path) -> bool {
        self.mac_content_folders.insert(folder.to_path_buf())
    }

    /// Bundle folders in first-use order.
    #[must_use]
    pub fn mac_content_folders(&self) -> &IndexSet<Utf8PathBuf> {
        &self.mac_content_folders
    }

    /// Record a file produced by a custom command.
    pub fn add_custom_output(&mut self, output: Utf8PathBuf) {
        self.custom_outputs.push(output);
    }

    /// Files produced by custom commands, in source order.
    #[must_use]
    pub fn custom_outputs(&self) -> &[Utf8PathBuf] {
        &self.custom_outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferedSink;
    use rstest::rstest;

    #[rstest]
    fn identical_rules_are_written_once() {
        let mut session = GenerationSession::new("app");
        let mut sink = BufferedSink::new();
        let rule = Rule::new("CXX_COMPILER__app", "c++ -c $in");
        assert!(session.emit_rule(&mut sink, &rule).expect("first"));
        assert!(!session.emit_rule(&mut sink, &rule).expect("second"));
        assert_eq!(sink.rules().count(), 1);
        assert!(session.has_rule("CXX_COMPILER__app"));
    }

    #[rstest]
    fn conflicting_rules_are_rejected() {
        let mut session = GenerationSession::new("app");
        let mut sink = BufferedSink::new();
        session
            .emit_rule(&mut sink, &Rule::new("R", "a"))
            .expect("first");
        let err = session
            .emit_rule(&mut sink, &Rule::new("R", "b"))
            .expect_err("conflict");
        assert!(matches!(err, GenError::ConflictingRule { .. }));
    }

    #[rstest]
    fn objects_are_claimed_once() {
        let mut session = GenerationSession::new("app");
        assert!(session.claim_object(Utf8Path::new("app.dir/a.o")));
        assert!(!session.claim_object(Utf8Path::new("app.dir/a.o")));
    }

    #[rstest]
    fn ddi_files_are_grouped_by_language() {
        let mut session = GenerationSession::new("app");
        let fortran = Language::from("Fortran");
        session.add_ddi_file(&fortran, "a.o.ddi".into());
        session.add_ddi_file(&fortran, "b.o.ddi".into());
        assert_eq!(session.ddi_files(&fortran).len(), 2);
        assert!(session.ddi_files(&Language::from("CXX")).is_empty());
    }
}
