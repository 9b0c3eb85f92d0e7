//! The sampler state: one tree, the named parameters and the random source.
//!
//! Operators mutate the state in place. The first mutable access to a
//! parameter within a step stores a copy of it, and tree edits are journaled
//! by the tree itself, so [`State::reject`] restores exactly what the last
//! proposal touched and [`State::accept`] discards the saved copies.

use serde::{Deserialize, Serialize};
use verdant_core::{Result, VerdantError};
use verdant_phylo::Tree;
use verdant_stats::Rng;

use crate::parameter::{ParamKind, Parameter};

/// Handle to a parameter registered in a [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamId(usize);

impl ParamId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Slot {
    name: String,
    value: Parameter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    tree: Tree,
    params: Vec<Slot>,
    rng: Rng,
    #[serde(skip)]
    saved: Vec<(ParamId, Parameter)>,
}

impl State {
    pub fn new(tree: Tree, rng: Rng) -> Self {
        Self {
            tree,
            params: Vec::new(),
            rng,
            saved: Vec::new(),
        }
    }

    /// Register a parameter under a unique, non-empty name.
    pub fn add_param(&mut self, name: impl Into<String>, value: Parameter) -> Result<ParamId> {
        let name = name.into();
        if name.is_empty() {
            return Err(VerdantError::Config("parameter name must not be empty".into()));
        }
        if value.is_empty() {
            return Err(VerdantError::Config(format!(
                "parameter '{name}' has no elements"
            )));
        }
        if self.param_id(&name).is_some() {
            return Err(VerdantError::Config(format!(
                "parameter '{name}' already exists"
            )));
        }
        self.params.push(Slot { name, value });
        Ok(ParamId(self.params.len() - 1))
    }

    pub fn param_id(&self, name: &str) -> Option<ParamId> {
        self.params
            .iter()
            .position(|slot| slot.name == name)
            .map(ParamId)
    }

    pub fn param_name(&self, id: ParamId) -> Result<&str> {
        Ok(&self.slot(id)?.name)
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    /// Parameters in registration order.
    pub fn params(&self) -> impl Iterator<Item = (ParamId, &str, &Parameter)> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, slot)| (ParamId(i), slot.name.as_str(), &slot.value))
    }

    /// Read a parameter. Ids from another state (or a checkpoint holding
    /// fewer parameters) give a `Config` error.
    pub fn param(&self, id: ParamId) -> Result<&Parameter> {
        Ok(&self.slot(id)?.value)
    }

    /// Mutable access to a parameter; saves its current value the first time
    /// it is touched since the last accept/reject.
    pub fn param_mut(&mut self, id: ParamId) -> Result<&mut Parameter> {
        self.check_id(id)?;
        if !self.saved.iter().any(|(saved, _)| *saved == id) {
            self.saved.push((id, self.params[id.0].value.clone()));
        }
        Ok(&mut self.params[id.0].value)
    }

    /// Real cells of a parameter, or a `Config` error for other kinds.
    pub fn real(&self, id: ParamId) -> Result<&[f64]> {
        let slot = self.slot(id)?;
        slot.value.as_real().ok_or_else(|| wrong_kind(&slot.name, ParamKind::Real, slot.value.kind()))
    }

    /// Mutable real cells of a parameter.
    pub fn real_mut(&mut self, id: ParamId) -> Result<&mut [f64]> {
        let slot = self.slot(id)?;
        let kind = slot.value.kind();
        if kind != ParamKind::Real {
            return Err(wrong_kind(&slot.name, ParamKind::Real, kind));
        }
        match self.param_mut(id)?.as_real_mut() {
            Some(cells) => Ok(cells),
            None => Err(VerdantError::Invariant("parameter changed kind".into())),
        }
    }

    /// Require `id` to be a real parameter with exactly `len` cells, or any
    /// length when `len` is `None`.
    pub fn expect_real(&self, id: ParamId, len: Option<usize>) -> Result<()> {
        let cells = self.real(id)?;
        match len {
            Some(n) if cells.len() != n => Err(VerdantError::Config(format!(
                "parameter '{}' must have {} element(s), has {}",
                self.param_name(id)?,
                n,
                cells.len()
            ))),
            _ => Ok(()),
        }
    }

    /// Check that `id` belongs to this state.
    pub fn check_id(&self, id: ParamId) -> Result<()> {
        self.slot(id).map(|_| ())
    }

    fn slot(&self, id: ParamId) -> Result<&Slot> {
        self.params.get(id.0).ok_or_else(|| {
            VerdantError::Config(format!(
                "unknown parameter id {} (state has {})",
                id.0,
                self.params.len()
            ))
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn rng(&mut self) -> &mut Rng {
        &mut self.rng
    }

    /// Split borrow for operators that draw while editing the tree.
    pub fn tree_and_rng(&mut self) -> (&mut Tree, &mut Rng) {
        (&mut self.tree, &mut self.rng)
    }

    /// True if anything was changed since the last accept/reject.
    pub fn is_dirty(&self) -> bool {
        !self.saved.is_empty() || self.tree.is_dirty()
    }

    /// Commit every change made since the last accept/reject.
    pub fn accept(&mut self) {
        self.saved.clear();
        self.tree.accept();
    }

    /// Undo every change made since the last accept/reject.
    pub fn reject(&mut self) {
        for (id, value) in self.saved.drain(..).rev() {
            self.params[id.0].value = value;
        }
        self.tree.reject();
    }

    /// Check the tree invariants of a freshly loaded state.
    pub fn validate(&self) -> Result<()> {
        self.tree.verify()
    }
}

fn wrong_kind(name: &str, expected: ParamKind, found: ParamKind) -> VerdantError {
    VerdantError::Config(format!(
        "parameter '{name}' must be {expected}, found {found}"
    ))
}

/// Structural equality; the random source and pending snapshots are ignored.
impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree && self.params == other.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State {
        let mut rng = Rng::seeded(3);
        let taxa: Vec<String> = (0..5).map(|i| format!("t{i}")).collect();
        let tree = Tree::random(taxa, &mut rng).unwrap();
        State::new(tree, rng)
    }

    #[test]
    fn params_by_name_and_id() {
        let mut s = state();
        let rate = s.add_param("rate", Parameter::Real(vec![1.0])).unwrap();
        let flags = s.add_param("flags", Parameter::Boolean(vec![true])).unwrap();
        assert_eq!(s.param_id("rate"), Some(rate));
        assert_eq!(s.param_name(flags).unwrap(), "flags");
        assert!(s.add_param("rate", Parameter::Real(vec![2.0])).is_err());
        assert!(s.add_param("", Parameter::Real(vec![2.0])).is_err());
        assert!(s.add_param("empty", Parameter::Real(vec![])).is_err());
        assert!(s.real(flags).is_err());
        assert!(s.expect_real(rate, Some(2)).is_err());
        s.expect_real(rate, Some(1)).unwrap();
    }

    #[test]
    fn foreign_ids_are_errors() {
        let mut big = state();
        big.add_param("a", Parameter::Real(vec![1.0])).unwrap();
        let b = big.add_param("b", Parameter::Real(vec![2.0])).unwrap();

        let mut small = state();
        small.add_param("a", Parameter::Real(vec![1.0])).unwrap();
        assert!(matches!(small.param(b), Err(VerdantError::Config(_))));
        assert!(matches!(small.param_name(b), Err(VerdantError::Config(_))));
        assert!(matches!(small.real_mut(b), Err(VerdantError::Config(_))));
        assert!(matches!(small.param_mut(b), Err(VerdantError::Config(_))));
        assert!(!small.is_dirty());
    }

    #[test]
    fn reject_restores_params_and_tree() {
        let mut s = state();
        let rate = s.add_param("rate", Parameter::Real(vec![1.0, 2.0])).unwrap();
        let before = s.clone();

        s.real_mut(rate).unwrap()[0] = 9.0;
        s.real_mut(rate).unwrap()[1] = 8.0;
        let root = s.tree().root();
        s.tree_mut().update_weight(root, 50.0);
        assert!(s.is_dirty());

        s.reject();
        assert_eq!(s, before);
        assert!(!s.is_dirty());
    }

    #[test]
    fn accept_keeps_changes() {
        let mut s = state();
        let rate = s.add_param("rate", Parameter::Real(vec![1.0])).unwrap();
        s.real_mut(rate).unwrap()[0] = 4.0;
        s.accept();
        s.reject();
        assert_eq!(s.real(rate).unwrap(), &[4.0]);
    }

    #[test]
    fn json_roundtrip_keeps_rng_position() {
        let mut s = state();
        s.add_param("k", Parameter::Integer(vec![1, 2])).unwrap();
        s.rng().uniform();

        let json = serde_json::to_string(&s).unwrap();
        let mut back: State = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back, s);
        assert_eq!(back.rng().uniform(), s.rng().uniform());
    }
}
