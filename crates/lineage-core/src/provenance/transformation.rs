use super::Provenance;
use crate::descriptor::{CanonicalDescriptor, TransformationDescriptor};
use crate::errors::Result;

pub type TransformationProvenance = Provenance<CanonicalDescriptor>;

impl Provenance<CanonicalDescriptor> {
    /// Decoded descriptors in application order
    ///
    /// # Errors
    ///
    /// `Serialization` if an entry is not a descriptor.
    pub fn descriptors(&self) -> Result<Vec<TransformationDescriptor>> {
        self.payloads().map(CanonicalDescriptor::parse).collect()
    }
}
