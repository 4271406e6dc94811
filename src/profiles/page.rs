use std::collections::HashSet;

use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Serialize;

use crate::{
    auth::CurrentUser,
    db::{CommentedRestaurant, Restaurant, UserBrief, UserId, UserSummary},
    store::Store,
    AppError, AppResult, AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub user: UserSummary,
    pub followers: Vec<UserBrief>,
    pub followings: Vec<UserBrief>,
    pub favorited_restaurants: Vec<Restaurant>,
    pub commented_restaurants: Vec<Restaurant>,
    pub comment_count: usize,
    pub is_followed: bool,
    pub is_self: bool,
}

/// One entry per restaurant, in the order each was first commented on.
pub fn dedup_restaurants(rows: Vec<CommentedRestaurant>) -> Vec<Restaurant> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.restaurant_id))
        .map(|row| Restaurant {
            id: row.restaurant_id,
            name: row.name,
            image: row.image,
        })
        .collect()
}

pub async fn get_profile(store: &Store, profile_id: UserId, viewer_id: UserId) -> AppResult<ProfileView> {
    let Some(user) = store.user_by_id(profile_id).await? else {
        return Err(AppError::NotFound(format!("user {profile_id} not found")));
    };

    let followers = store.followers_of(profile_id).await?;
    let followings = store.followings_of(profile_id).await?;
    let favorited_restaurants = store.favorited_restaurants(profile_id).await?;
    let comments = store.commented_restaurants(profile_id).await?;

    let comment_count = comments.len();
    let is_followed = followers.iter().any(|follower| follower.id == viewer_id);

    Ok(ProfileView {
        user: UserSummary::from(&user),
        followers,
        followings,
        favorited_restaurants,
        commented_restaurants: dedup_restaurants(comments),
        comment_count,
        is_followed,
        is_self: profile_id == viewer_id,
    })
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    Path(profile_id): Path<UserId>,
    State(store): State<Store>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(get_profile(&store, profile_id, viewer.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{social::{add_favorite, add_following}, store::tests::seeded_user};

    fn row(comment_id: i64, restaurant_id: i64) -> CommentedRestaurant {
        CommentedRestaurant {
            comment_id,
            restaurant_id,
            name: format!("r{restaurant_id}"),
            image: None,
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let ids: Vec<_> = dedup_restaurants(vec![row(1, 7), row(2, 3), row(3, 7), row(4, 9), row(5, 3)])
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![7, 3, 9]);
    }

    #[tokio::test]
    async fn three_comments_on_two_restaurants_list_two() {
        let store = Store::in_memory().await.unwrap();
        let ann = seeded_user(&store, "Ann").await;
        let diner = store.insert_restaurant("Diner", None).await.unwrap();
        let cafe = store.insert_restaurant("Cafe", None).await.unwrap();
        store.insert_comment(ann.id, diner.id, "great fries").await.unwrap();
        store.insert_comment(ann.id, cafe.id, "good coffee").await.unwrap();
        store.insert_comment(ann.id, diner.id, "fries again").await.unwrap();

        let view = get_profile(&store, ann.id, ann.id).await.unwrap();
        assert_eq!(view.comment_count, 3);
        let ids: Vec<_> = view.commented_restaurants.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![diner.id, cafe.id]);
        assert!(view.is_self);
    }

    #[tokio::test]
    async fn profile_reports_relations_and_follow_state() {
        let store = Store::in_memory().await.unwrap();
        let ann = seeded_user(&store, "Ann").await;
        let bob = seeded_user(&store, "Bob").await;
        let cid = seeded_user(&store, "Cid").await;
        let diner = store.insert_restaurant("Diner", None).await.unwrap();

        add_following(&store, bob.id, ann.id).await.unwrap();
        add_following(&store, ann.id, cid.id).await.unwrap();
        add_favorite(&store, ann.id, diner.id).await.unwrap();

        let seen_by_bob = get_profile(&store, ann.id, bob.id).await.unwrap();
        assert!(seen_by_bob.is_followed);
        assert!(!seen_by_bob.is_self);
        assert_eq!(seen_by_bob.followers, vec![UserBrief { id: bob.id, image: bob.image.clone() }]);
        assert_eq!(seen_by_bob.followings.len(), 1);
        assert_eq!(seen_by_bob.favorited_restaurants[0].id, diner.id);

        let seen_by_cid = get_profile(&store, ann.id, cid.id).await.unwrap();
        assert!(!seen_by_cid.is_followed);
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let store = Store::in_memory().await.unwrap();
        let ann = seeded_user(&store, "Ann").await;
        let err = get_profile(&store, ann.id + 100, ann.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
