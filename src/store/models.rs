use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of catalog item mirrored locally for counter bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Track,
    Album,
    Playlist,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Track => "track",
            ItemType::Album => "album",
            ItemType::Playlist => "playlist",
        }
    }
}

impl FromStr for ItemType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(ItemType::Track),
            "album" => Ok(ItemType::Album),
            "playlist" => Ok(ItemType::Playlist),
            _ => bail!("unknown item type {}", s),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a like can point at. Catalog items get their counter on the
/// `catalog_item` row, reviews and annotations carry their own like_count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Track,
    Album,
    Playlist,
    Review,
    Annotation,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Track => "track",
            TargetType::Album => "album",
            TargetType::Playlist => "playlist",
            TargetType::Review => "review",
            TargetType::Annotation => "annotation",
        }
    }

    /// The catalog item type when the target is a catalog item.
    pub fn catalog_item_type(&self) -> Option<ItemType> {
        match self {
            TargetType::Track => Some(ItemType::Track),
            TargetType::Album => Some(ItemType::Album),
            TargetType::Playlist => Some(ItemType::Playlist),
            TargetType::Review | TargetType::Annotation => None,
        }
    }
}

impl FromStr for TargetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(TargetType::Track),
            "album" => Ok(TargetType::Album),
            "playlist" => Ok(TargetType::Playlist),
            "review" => Ok(TargetType::Review),
            "annotation" => Ok(TargetType::Annotation),
            _ => bail!("unknown target type {}", s),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub handle: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub image_url: Option<String>,
    pub country: Option<String>,
    pub spotify_url: Option<String>,
    pub created: i64,
}

/// Fields a user may change after sign-up. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileUpdate {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub image_url: Option<String>,
    pub country: Option<String>,
    pub spotify_url: Option<String>,
}

/// Local mirror of a Spotify catalog item, holding the denormalized counters.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub id: String,
    pub item_type: ItemType,
    pub like_count: i64,
    pub review_count: i64,
    pub annotation_count: i64,
    pub rating_sum: f64,
    pub rating_count: i64,
    pub last_updated: i64,
}

impl CatalogItem {
    pub fn avg_rating(&self) -> Option<f64> {
        if self.rating_count > 0 {
            Some(self.rating_sum / self.rating_count as f64)
        } else {
            None
        }
    }

    pub fn stats(&self) -> ItemStats {
        ItemStats {
            like_count: self.like_count,
            review_count: self.review_count,
            annotation_count: self.annotation_count,
            avg_rating: self.avg_rating(),
        }
    }
}

/// Wire form of the counters, also returned (zeroed) for items never engaged with.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub like_count: i64,
    pub review_count: i64,
    pub annotation_count: i64,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_id: i64,
    pub item_id: String,
    pub item_type: ItemType,
    pub rating: f64,
    pub text: Option<String>,
    pub is_public: bool,
    pub like_count: i64,
    pub created: i64,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: i64,
    pub item_id: String,
    pub item_type: ItemType,
    pub rating: f64,
    pub text: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewUpdate {
    pub rating: Option<f64>,
    pub text: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub user_id: i64,
    pub track_id: String,
    pub timestamp: f64,
    pub text: String,
    pub is_public: bool,
    pub like_count: i64,
    pub created: i64,
}

#[derive(Debug, Clone)]
pub struct NewAnnotation {
    pub user_id: i64,
    pub track_id: String,
    pub timestamp: f64,
    pub text: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationUpdate {
    pub timestamp: Option<f64>,
    pub text: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub target_type: TargetType,
    pub target_id: String,
    pub created: i64,
}

/// Local mirror of a playlist created through the Spotify API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistMirror {
    pub id: String,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub is_collaborative: bool,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub target_type: TargetType,
    pub target_id: String,
    pub created: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_rating_is_none_without_reviews() {
        let item = CatalogItem {
            id: "T1".to_string(),
            item_type: ItemType::Track,
            like_count: 0,
            review_count: 0,
            annotation_count: 0,
            rating_sum: 0.0,
            rating_count: 0,
            last_updated: 0,
        };
        assert_eq!(item.avg_rating(), None);
    }

    #[test]
    fn avg_rating_is_the_mean_of_ratings() {
        let item = CatalogItem {
            id: "T1".to_string(),
            item_type: ItemType::Track,
            like_count: 0,
            review_count: 3,
            annotation_count: 0,
            rating_sum: 10.5,
            rating_count: 3,
            last_updated: 0,
        };
        assert_eq!(item.avg_rating(), Some(3.5));
    }

    #[test]
    fn target_type_round_trips_through_str() {
        for target_type in [
            TargetType::Track,
            TargetType::Album,
            TargetType::Playlist,
            TargetType::Review,
            TargetType::Annotation,
        ] {
            assert_eq!(
                target_type.as_str().parse::<TargetType>().unwrap(),
                target_type
            );
        }
        assert!("artist".parse::<TargetType>().is_err());
    }
}
