//! Shader Parameter Sets
//!
//! A [`ParamSet`] is the CPU-side mirror of a program's named inputs: floats,
//! colors, vectors, matrices and textures, addressed by the names the program
//! declares (`_BlurSize`, `_Bloom`, ...). Materials own one; pass steps carry
//! another as per-step overrides.

use glam::{Mat4, Vec4};
use rustc_hash::FxHashMap;

use crate::renderer::device::BufferHandle;

/// A single named shader input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    /// Linear RGBA color.
    Color(Vec4),
    Vector(Vec4),
    Matrix(Mat4),
    Texture(BufferHandle),
}

impl ParamValue {
    /// Short type name used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Color(_) => "color",
            Self::Vector(_) => "vector",
            Self::Matrix(_) => "matrix",
            Self::Texture(_) => "texture",
        }
    }
}

/// Named parameter storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: FxHashMap<&'static str, ParamValue>,
}

impl ParamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&mut self, name: &'static str, value: ParamValue) {
        self.values.insert(name, value);
    }

    #[inline]
    pub fn set_float(&mut self, name: &'static str, value: f32) {
        self.set(name, ParamValue::Float(value));
    }

    #[inline]
    pub fn set_color(&mut self, name: &'static str, value: Vec4) {
        self.set(name, ParamValue::Color(value));
    }

    #[inline]
    pub fn set_vector(&mut self, name: &'static str, value: Vec4) {
        self.set(name, ParamValue::Vector(value));
    }

    #[inline]
    pub fn set_matrix(&mut self, name: &'static str, value: Mat4) {
        self.set(name, ParamValue::Matrix(value));
    }

    #[inline]
    pub fn set_texture(&mut self, name: &'static str, value: BufferHandle) {
        self.set(name, ParamValue::Texture(value));
    }

    /// Builder-style float setter, convenient for step overrides.
    #[must_use]
    pub fn with_float(mut self, name: &'static str, value: f32) -> Self {
        self.set_float(name, value);
        self
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_color(&self, name: &str) -> Option<Vec4> {
        match self.values.get(name) {
            Some(ParamValue::Color(v)) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_vector(&self, name: &str) -> Option<Vec4> {
        match self.values.get(name) {
            Some(ParamValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_matrix(&self, name: &str) -> Option<Mat4> {
        match self.values.get(name) {
            Some(ParamValue::Matrix(v)) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_texture(&self, name: &str) -> Option<BufferHandle> {
        match self.values.get(name) {
            Some(ParamValue::Texture(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.remove(name)
    }

    /// Copies every entry of `other` into `self`, overwriting existing names.
    pub fn apply(&mut self, other: &ParamSet) {
        self.values
            .extend(other.values.iter().map(|(k, v)| (*k, *v)));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Iterates over the texture bindings only.
    pub fn textures(&self) -> impl Iterator<Item = (&'static str, BufferHandle)> + '_ {
        self.values.iter().filter_map(|(k, v)| match v {
            ParamValue::Texture(h) => Some((*k, *h)),
            _ => None,
        })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_reject_mismatched_kinds() {
        let mut params = ParamSet::new();
        params.set_float("_BlurSize", 1.5);
        assert_eq!(params.get_float("_BlurSize"), Some(1.5));
        assert_eq!(params.get_vector("_BlurSize"), None);
        assert_eq!(params.get_float("_Missing"), None);
    }

    #[test]
    fn apply_overwrites_existing_entries() {
        let mut base = ParamSet::new().with_float("_BlurSize", 1.0).with_float("_Keep", 2.0);
        let overrides = ParamSet::new().with_float("_BlurSize", 3.0);
        base.apply(&overrides);
        assert_eq!(base.get_float("_BlurSize"), Some(3.0));
        assert_eq!(base.get_float("_Keep"), Some(2.0));
        assert_eq!(base.len(), 2);
    }
}
