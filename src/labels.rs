//! Label vectors: one non-negative mass per class.  All vectors taking part in a run share the
//! same number of classes, fixed by a [`LabelFactory`].
use std::fmt;
use std::io::{Read, Write, Result as IOResult};
use std::sync::Arc;

use float_ord::FloatOrd;

use crate::alphabet::Alphabet;
use crate::error::{Error, Result};
use crate::info;

const MAX_PREALLOC: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormType {
    Manhattan,
    Euclidean
}

/// Immutable vector of class masses.  Arithmetic returns new vectors; cloning is cheap since the
/// storage is shared.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelVector {
    classes: Arc<[f64]>
}

impl LabelVector {
    pub fn new(classes: Vec<f64>) -> Self {
        LabelVector { classes: classes.into() }
    }

    pub fn zeros(num_classes: usize) -> Self {
        LabelVector::new(vec![0.; num_classes])
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.classes
    }

    pub fn get(&self, class: usize) -> Option<f64> {
        self.classes.get(class).copied()
    }

    pub fn check_dims(&self, other: &LabelVector) -> Result<()> {
        if self.len() == other.len() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch { expected: self.len(), found: other.len() })
        }
    }

    pub fn scale(&self, constant: f64) -> LabelVector {
        LabelVector::new(self.classes.iter().map(|c| c * constant).collect())
    }

    pub fn add(&self, other: &LabelVector) -> Result<LabelVector> {
        self.check_dims(other)?;
        Ok(LabelVector::new(self.classes.iter().zip(other.classes.iter())
            .map(|(a, b)| a + b)
            .collect()))
    }

    pub fn subtract(&self, other: &LabelVector) -> Result<LabelVector> {
        self.check_dims(other)?;
        Ok(LabelVector::new(self.classes.iter().zip(other.classes.iter())
            .map(|(a, b)| a - b)
            .collect()))
    }

    /// Total mass.  Entries are non-negative, so no absolute values are taken.
    pub fn manhattan_norm(&self) -> f64 {
        self.classes.iter().sum()
    }

    pub fn euclidean_norm(&self) -> f64 {
        self.classes.iter().map(|c| c * c).sum::<f64>().sqrt()
    }

    pub fn norm(&self, norm_type: NormType) -> f64 {
        match norm_type {
            NormType::Manhattan => self.manhattan_norm(),
            NormType::Euclidean => self.euclidean_norm()
        }
    }

    /// Divides by the requested norm.  A vector whose norm is zero has no normalized form and
    /// yields `None`, never a zero vector.
    pub fn normalize(&self, norm_type: NormType) -> Option<LabelVector> {
        let norm = self.norm(norm_type);
        if norm > 0. {
            Some(LabelVector::new(self.classes.iter().map(|c| c / norm).collect()))
        } else {
            None
        }
    }

    /// Shannon entropy in bits, treating the entries as unnormalized counts.
    pub fn entropy(&self) -> f64 {
        info::entropy_frequencies(&self.classes)
    }

    /// Index of the first class holding the largest positive mass, `None` when no class has
    /// any mass.
    pub fn argmax(&self) -> Option<usize> {
        let mut best = None;
        let mut max = 0.;
        for (idx, c) in self.classes.iter().enumerate() {
            if *c > max {
                best = Some(idx);
                max = *c;
            }
        }
        best
    }

    /// Classes ordered by decreasing mass; classes without mass are skipped.
    pub fn ranked(&self) -> Vec<(usize, f64)> {
        let mut ranked: Vec<_> = self.classes.iter().copied().enumerate()
            .filter(|(_, c)| *c > 0.)
            .collect();
        ranked.sort_by_key(|(_, c)| FloatOrd(-*c));
        ranked
    }

    /// Length prefixed (big endian `i32`) sequence of big endian IEEE-754 doubles.
    pub fn write_to<W: Write>(&self, output: &mut W) -> IOResult<()> {
        output.write_all(&(self.classes.len() as i32).to_be_bytes())?;
        for c in self.classes.iter() {
            output.write_all(&c.to_be_bytes())?;
        }
        Ok(())
    }

    /// A missing label is written as a zero length.
    pub fn write_optional<W: Write>(label: Option<&LabelVector>, output: &mut W) -> IOResult<()> {
        match label {
            Some(label) => label.write_to(output),
            None => output.write_all(&0i32.to_be_bytes())
        }
    }

    /// Reads a vector written by `write_to`; a zero length decodes to `None`.
    pub fn read_from<R: Read>(input: &mut R) -> Result<Option<LabelVector>> {
        let mut len_buf = [0u8; 4];
        input.read_exact(&mut len_buf)?;
        let len = i32::from_be_bytes(len_buf);
        if len < 0 {
            return Err(Error::InvalidParameter(format!("negative label length {}", len)));
        }

        // The length prefix is untrusted; the vector grows as doubles actually arrive
        let mut buf = [0u8; 8];
        let mut classes = Vec::with_capacity((len as usize).min(MAX_PREALLOC));
        for _ in 0..len {
            input.read_exact(&mut buf)?;
            classes.push(f64::from_be_bytes(buf));
        }

        Ok(if classes.is_empty() { None } else { Some(LabelVector::new(classes)) })
    }

    /// Renders classes by name: `(neg: 0.25, pos: 0.75) = pos`.
    pub fn describe(&self, alphabet: &Alphabet) -> String {
        let name = |idx: Option<usize>| {
            idx.and_then(|i| alphabet.get_token(i as i64))
                .map(|t| t.to_string())
                .unwrap_or_else(|| "null".to_string())
        };

        let classes: Vec<_> = self.classes.iter().enumerate()
            .map(|(idx, c)| format!("{}: {}", name(Some(idx)), c))
            .collect();
        format!("({}) = {}", classes.join(", "), name(self.argmax()))
    }
}

impl fmt::Display for LabelVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, c) in self.classes.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        match self.argmax() {
            Some(idx) => write!(f, ") = {}", idx),
            None => write!(f, ") = -1")
        }
    }
}

/// Creates label vectors of a fixed class count.
#[derive(Clone, Debug)]
pub struct LabelFactory {
    num_classes: usize,
    alphabet: Option<Arc<Alphabet>>
}

impl LabelFactory {
    pub fn new(num_classes: usize) -> Result<Self> {
        if num_classes == 0 {
            return Err(Error::InvalidParameter("at least one class is required".into()));
        }
        Ok(LabelFactory { num_classes, alphabet: None })
    }

    /// Class names come from the alphabet, which must be sealed so the class count can't move.
    pub fn from_alphabet(alphabet: Alphabet) -> Result<Self> {
        if !alphabet.is_sealed() {
            return Err(Error::InvalidParameter("alphabet must be sealed before creating labels".into()));
        }
        let mut factory = LabelFactory::new(alphabet.len())?;
        factory.alphabet = Some(Arc::new(alphabet));
        Ok(factory)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn alphabet(&self) -> Option<&Alphabet> {
        self.alphabet.as_deref()
    }

    pub fn zeros(&self) -> LabelVector {
        LabelVector::zeros(self.num_classes)
    }

    pub fn create(&self, classes: Vec<f64>) -> Result<LabelVector> {
        if classes.len() != self.num_classes {
            return Err(Error::DimensionMismatch { expected: self.num_classes, found: classes.len() });
        }
        if let Some(c) = classes.iter().find(|c| !(c.is_finite() && **c >= 0.)) {
            return Err(Error::InvalidParameter(format!("label mass must be finite and non-negative, got {}", c)));
        }
        Ok(LabelVector::new(classes))
    }

    /// All mass on a single class.
    pub fn create_singleton(&self, class: usize) -> Result<LabelVector> {
        if class >= self.num_classes {
            return Err(Error::InvalidParameter(
                format!("class {} out of range for {} classes", class, self.num_classes)));
        }
        let mut classes = vec![0.; self.num_classes];
        classes[class] = 1.;
        Ok(LabelVector::new(classes))
    }

    /// Looks the class up by name in the factory's alphabet.
    pub fn create_named(&self, token: &str) -> Result<LabelVector> {
        let class = self.alphabet.as_ref()
            .and_then(|a| a.get_id(token))
            .ok_or_else(|| Error::InvalidParameter(format!("unknown class {:?}", token)))?;
        self.create_singleton(class as usize)
    }
}

#[cfg(test)]
mod label_tests {
    use super::*;

    fn eight() -> LabelFactory {
        LabelFactory::new(8).unwrap()
    }

    fn assert_close(a: &LabelVector, b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.as_slice().iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_scale() {
        let f = eight();
        let label = f.create(vec![1., 2., 3., 4., 5., 6., 7., 8.]).unwrap().scale(3.);
        assert_eq!(label, f.create(vec![3., 6., 9., 12., 15., 18., 21., 24.]).unwrap());
    }

    #[test]
    fn test_add() {
        let f = eight();
        let a = f.create(vec![1., 2., 3., 4., 5., 6., 7., 8.]).unwrap();
        let b = f.create(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]).unwrap();
        assert_close(&a.add(&b).unwrap(), &[1.1, 2.2, 3.3, 4.4, 5.5, 6.6, 7.7, 8.8]);
    }

    #[test]
    fn test_subtract() {
        let f = eight();
        let a = f.create(vec![1., 2., 3., 4., 5., 6., 7., 8.]).unwrap();
        let b = f.create(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]).unwrap();
        assert_close(&a.subtract(&b).unwrap(), &[0.9, 1.8, 2.7, 3.6, 4.5, 5.4, 6.3, 7.2]);

        // Inputs are untouched
        assert_eq!(a.as_slice()[0], 1.);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = LabelVector::new(vec![1., 2.]);
        let b = LabelVector::new(vec![1., 2., 3.]);
        assert!(matches!(a.add(&b), Err(Error::DimensionMismatch { expected: 2, found: 3 })));
        assert!(matches!(b.subtract(&a), Err(Error::DimensionMismatch { expected: 3, found: 2 })));
    }

    #[test]
    fn test_norms() {
        let label = LabelVector::new(vec![3., 0., 4.]);
        assert_eq!(label.manhattan_norm(), 7.);
        assert_eq!(label.euclidean_norm(), 5.);
    }

    #[test]
    fn test_normalize() {
        let label = LabelVector::new(vec![0.2, 0.6, 1.2]);
        let normed = label.normalize(NormType::Manhattan).unwrap();
        assert!((normed.manhattan_norm() - 1.).abs() < 1e-12);
        assert_close(&normed, &[0.1, 0.3, 0.6]);

        let normed = LabelVector::new(vec![3., 4.]).normalize(NormType::Euclidean).unwrap();
        assert_close(&normed, &[0.6, 0.8]);

        assert_eq!(LabelVector::zeros(3).normalize(NormType::Manhattan), None);
        assert_eq!(LabelVector::zeros(3).normalize(NormType::Euclidean), None);
    }

    #[test]
    fn test_entropy() {
        assert_eq!(LabelVector::new(vec![5., 5.]).entropy(), 1.);
        assert_eq!(LabelVector::new(vec![15., 15.]).entropy(), 1.);
        assert_eq!(LabelVector::new(vec![5., 0., 0.]).entropy(), 0.);
        assert!((LabelVector::new(vec![1., 3.]).entropy() - 0.8112781244591328).abs() < 1e-12);
        assert_eq!(LabelVector::zeros(2).entropy(), 0.);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(LabelVector::new(vec![0.1, 0.7, 0.2]).argmax(), Some(1));
        assert_eq!(LabelVector::new(vec![0.4, 0.2, 0.4]).argmax(), Some(0));
        assert_eq!(LabelVector::zeros(3).argmax(), None);
        assert_eq!(LabelVector::new(vec![]).argmax(), None);
    }

    #[test]
    fn test_ranked() {
        let ranked = LabelVector::new(vec![0.1, 0., 0.6, 0.3]).ranked();
        assert_eq!(ranked, vec![(2, 0.6), (3, 0.3), (0, 0.1)]);
    }

    #[test]
    fn test_codec() {
        let f = eight();
        let expected = f.create(vec![1., 2., 3., 4., 5., 6., 7., 8.]).unwrap();

        let mut buf = Vec::new();
        expected.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 8 * 8);
        assert_eq!(&buf[..4], &[0, 0, 0, 8]);
        assert_eq!(&buf[4..12], &1f64.to_be_bytes());

        let actual = LabelVector::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(actual, Some(expected));
    }

    #[test]
    fn test_codec_absent() {
        let mut buf = Vec::new();
        LabelVector::write_optional(None, &mut buf).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);
        assert_eq!(LabelVector::read_from(&mut buf.as_slice()).unwrap(), None);

        // Truncated payload
        let mut buf = Vec::new();
        LabelVector::new(vec![1., 2.]).write_to(&mut buf).unwrap();
        buf.truncate(10);
        assert!(matches!(LabelVector::read_from(&mut buf.as_slice()), Err(Error::Io(_))));
    }

    #[test]
    fn test_codec_huge_length() {
        let header = [0x7f, 0xff, 0xff, 0xff];
        assert!(matches!(LabelVector::read_from(&mut &header[..]), Err(Error::Io(_))));

        let mut buf = header.to_vec();
        buf.extend_from_slice(&0.5f64.to_be_bytes());
        assert!(matches!(LabelVector::read_from(&mut buf.as_slice()), Err(Error::Io(_))));
    }

    #[test]
    fn test_factory() {
        let f = LabelFactory::new(3).unwrap();
        assert_eq!(f.num_classes(), 3);
        assert_eq!(f.zeros(), LabelVector::new(vec![0., 0., 0.]));
        assert_eq!(f.create_singleton(1).unwrap(), LabelVector::new(vec![0., 1., 0.]));
        assert!(f.create_singleton(3).is_err());
        assert!(matches!(f.create(vec![1., 2.]), Err(Error::DimensionMismatch { .. })));
        assert!(matches!(f.create(vec![1., -2., 0.]), Err(Error::InvalidParameter(_))));
        assert!(LabelFactory::new(0).is_err());
    }

    #[test]
    fn test_factory_alphabet() {
        let mut open = Alphabet::new();
        open.get("-1").unwrap();
        assert!(LabelFactory::from_alphabet(open).is_err());

        let f = LabelFactory::from_alphabet(Alphabet::from_tokens(&["-1", "+1"]).unwrap()).unwrap();
        assert_eq!(f.num_classes(), 2);
        assert_eq!(f.create_named("+1").unwrap(), LabelVector::new(vec![0., 1.]));
        assert!(f.create_named("0").is_err());
    }

    #[test]
    fn test_display() {
        let alphabet = Alphabet::from_tokens(&["neg", "pos"]).unwrap();
        let label = LabelVector::new(vec![0.25, 0.75]);
        assert_eq!(label.to_string(), "(0.25, 0.75) = 1");
        assert_eq!(label.describe(&alphabet), "(neg: 0.25, pos: 0.75) = pos");
        assert_eq!(LabelVector::zeros(2).describe(&alphabet), "(neg: 0, pos: 0) = null");
        assert_eq!(LabelVector::zeros(2).to_string(), "(0, 0) = -1");
    }
}
