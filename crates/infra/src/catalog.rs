//! Catalog items: the mutations the permission gate guards.

use serde::{Deserialize, Serialize};

use sickfits_core::{Entity, ItemId, UserId};

/// A storefront item. `price` is in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub owner: Option<UserId>,
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub price: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub large_image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
}

impl Item {
    pub fn create(id: ItemId, owner: Option<UserId>, new_item: NewItem) -> Self {
        Self {
            id,
            title: new_item.title,
            description: new_item.description,
            price: new_item.price,
            image: new_item.image,
            large_image: new_item.large_image,
            owner,
        }
    }

    pub fn apply(&mut self, patch: ItemPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
    }
}
