//! Public value types shared by the fetch engine and its collaborators.

mod location;
mod metadata;
mod resource;
mod sha1;

pub use location::ResourceLocation;
pub use metadata::ResourceMetadata;
pub use resource::LocallyAvailableResource;
pub use sha1::Sha1Hash;
