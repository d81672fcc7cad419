mod collection_repository;
mod item_repository;

pub use collection_repository::{CollectionRepository, SqliteCollectionRepository};
pub use item_repository::{ItemRepository, SqliteItemRepository};

use crate::error::Result;

pub trait Repository {
    type Entity;
    type Id;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>>;
}
