//! Symbol templates: validated, reusable symbol construction
//!
//! A template is a wildcard type pattern, required/optional payload
//! fields, an optional default gate, and an optional validation hook.
//! Pure composition — a pattern plus a closure, no hierarchy.

use serde_json::Value;
use sigil_types::{GateCondition, SigilError, SigilResult, Symbol, SymbolId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

type PayloadValidator = Arc<dyn Fn(&BTreeMap<String, Value>) -> Result<(), String> + Send + Sync>;

/// A template for stamping out validated symbols
#[derive(Clone)]
pub struct SymbolTemplate {
    /// Wildcard pattern over symbol types, e.g. `CHARSTATE:*`
    pattern: String,
    required_fields: BTreeSet<String>,
    optional_fields: BTreeSet<String>,
    default_gate: Option<GateCondition>,
    validator: Option<PayloadValidator>,
}

impl SymbolTemplate {
    /// Create a template. The pattern must contain a `*` wildcard.
    pub fn new(pattern: impl Into<String>) -> SigilResult<Self> {
        let pattern = pattern.into();
        if !pattern.contains('*') {
            return Err(SigilError::InvalidTemplatePattern(pattern));
        }
        Ok(Self {
            pattern,
            required_fields: BTreeSet::new(),
            optional_fields: BTreeSet::new(),
            default_gate: None,
            validator: None,
        })
    }

    pub fn with_required_field(mut self, field: impl Into<String>) -> Self {
        self.required_fields.insert(field.into());
        self
    }

    pub fn with_optional_field(mut self, field: impl Into<String>) -> Self {
        self.optional_fields.insert(field.into());
        self
    }

    pub fn with_default_gate(mut self, gate: GateCondition) -> Self {
        self.default_gate = Some(gate);
        self
    }

    /// Attach a payload validation hook, run after the required-field
    /// check
    pub fn with_validator(
        mut self,
        validator: impl Fn(&BTreeMap<String, Value>) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a symbol type matches this template's wildcard pattern
    pub fn matches(&self, symbol_type: &str) -> bool {
        glob_match(&self.pattern, symbol_type)
    }

    /// Build a validated symbol from this template.
    ///
    /// Uses the template's default gate when none is supplied.
    pub fn instantiate(
        &self,
        id: impl Into<SymbolId>,
        symbol_type: impl Into<String>,
        payload: BTreeMap<String, Value>,
        gate: Option<GateCondition>,
    ) -> SigilResult<Symbol> {
        let symbol_type = symbol_type.into();
        if !self.matches(&symbol_type) {
            return Err(SigilError::TemplateMismatch {
                symbol_type,
                pattern: self.pattern.clone(),
            });
        }

        let missing: Vec<String> = self
            .required_fields
            .iter()
            .filter(|field| !payload.contains_key(*field))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SigilError::MissingPayloadFields { fields: missing });
        }

        if let Some(validator) = &self.validator {
            validator(&payload).map_err(SigilError::PayloadRejected)?;
        }

        let gate = gate
            .or_else(|| self.default_gate.clone())
            .unwrap_or_default();

        let mut symbol = Symbol::new(id, symbol_type, gate);
        symbol.payload = payload;
        Ok(symbol)
    }
}

impl std::fmt::Debug for SymbolTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTemplate")
            .field("pattern", &self.pattern)
            .field("required_fields", &self.required_fields)
            .field("optional_fields", &self.optional_fields)
            .field("default_gate", &self.default_gate)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Registry of templates, looked up by exact pattern first and by type
/// matching second
#[derive(Clone, Debug, Default)]
pub struct TemplateRegistry {
    templates: Vec<SymbolTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. A template with the same pattern is replaced.
    pub fn register(&mut self, template: SymbolTemplate) {
        self.templates.retain(|t| t.pattern != template.pattern);
        self.templates.push(template);
    }

    /// Exact pattern lookup
    pub fn get(&self, pattern: &str) -> Option<&SymbolTemplate> {
        self.templates.iter().find(|t| t.pattern == pattern)
    }

    /// First template whose pattern matches the symbol type, in
    /// registration order
    pub fn find_for_type(&self, symbol_type: &str) -> Option<&SymbolTemplate> {
        self.templates.iter().find(|t| t.matches(symbol_type))
    }

    /// Instantiate through the template registered under `pattern`,
    /// falling back to pattern matching against the symbol type
    pub fn instantiate(
        &self,
        pattern: &str,
        id: impl Into<SymbolId>,
        symbol_type: impl Into<String>,
        payload: BTreeMap<String, Value>,
        gate: Option<GateCondition>,
    ) -> SigilResult<Symbol> {
        let symbol_type = symbol_type.into();
        let template = self
            .get(pattern)
            .or_else(|| self.find_for_type(&symbol_type))
            .ok_or_else(|| SigilError::TemplateNotFound(pattern.to_string()))?;
        template.instantiate(id, symbol_type, payload, gate)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Wildcard match: `*` spans any run of characters
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();

    let mut remainder = candidate;
    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if index == 0 {
            match remainder.strip_prefix(segment) {
                Some(rest) => remainder = rest,
                None => return false,
            }
        } else if index == segments.len() - 1 {
            return remainder.ends_with(segment);
        } else {
            match remainder.find(segment) {
                Some(at) => remainder = &remainder[at + segment.len()..],
                None => return false,
            }
        }
    }

    // A pattern ending in '*' accepts any remainder.
    segments.last().map(|s| s.is_empty()).unwrap_or(false) || remainder.is_empty()
}
