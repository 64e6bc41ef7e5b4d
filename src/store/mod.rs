mod models;
mod schema;
#[allow(clippy::module_inception)]
mod store;
mod trait_def;

pub use models::{
    Activity, Annotation, AnnotationUpdate, CatalogItem, ItemStats, ItemType, Like, NewAnnotation,
    NewReview, PlaylistMirror, Review, ReviewUpdate, TargetType, User, UserProfileUpdate,
};
pub use store::SqliteEngagementStore;
pub use trait_def::{AuthStore, EngagementStore, FullStore};
