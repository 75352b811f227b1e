// Unit tests for Matcha discovery

use chrono::NaiveDate;
use matcha_discovery::core::{
    build_filters, calculate_bounding_box, distance_between, haversine_distance, is_mutually_compatible,
    is_within_bounding_box, matches_all, resolve_clauses, AgeBounds, Criterion, FilterParams,
};
use matcha_discovery::models::{Candidate, Coordinates, Gender, Location, Orientation, Profile};

fn create_profile(id: i32, gender: Gender, orientation: Orientation) -> Profile {
    Profile {
        id,
        username: format!("user{}", id),
        first_name: format!("First{}", id),
        last_name: "Tester".to_string(),
        verified: true,
        gender: Some(gender),
        orientation: Some(orientation),
        birthday: NaiveDate::from_ymd_opt(1996, 4, 20),
        bio: None,
        avatar_url: None,
        fame_rating: 10.0,
    }
}

fn at(profile: Profile, lat: f64, lon: f64) -> Candidate {
    Candidate {
        profile,
        location: Some(Location {
            latitude: lat,
            longitude: lon,
            accuracy_m: None,
            updated_at: chrono::Utc::now(),
        }),
    }
}

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(48.8566, 2.3522, 48.8566, 2.3522);
    assert!(distance < 1e-9);
}

#[test]
fn test_haversine_symmetry() {
    let points = [(48.8566, 2.3522), (-33.8688, 151.2093), (64.1466, -21.9426), (0.0, 179.9)];
    for a in points {
        for b in points {
            let ab = haversine_distance(a.0, a.1, b.0, b.1);
            let ba = haversine_distance(b.0, b.1, a.0, a.1);
            assert!((ab - ba).abs() <= 1e-6 * ab.max(1.0));
        }
    }
}

#[test]
fn test_haversine_paris_to_marseille() {
    // Paris to Marseille is roughly 660km
    let paris = Coordinates { latitude: 48.8566, longitude: 2.3522 };
    let marseille = Coordinates { latitude: 43.2965, longitude: 5.3698 };
    let distance = distance_between(paris, marseille);
    assert!(distance > 640.0 && distance < 680.0);
}

#[test]
fn test_bounding_box_contains_center() {
    let bbox = calculate_bounding_box(48.8566, 2.3522, 25.0);
    assert!(is_within_bounding_box(48.8566, 2.3522, &bbox));
    assert!(!is_within_bounding_box(45.7640, 4.8357, &bbox));
}

#[test]
fn test_straight_woman_sees_straight_and_bi_men() {
    let caller = create_profile(1, Gender::Woman, Orientation::LikesMen);

    assert!(is_mutually_compatible(&caller, &create_profile(2, Gender::Man, Orientation::LikesWomen)));
    assert!(is_mutually_compatible(&caller, &create_profile(3, Gender::Man, Orientation::LikesBoth)));
    assert!(!is_mutually_compatible(&caller, &create_profile(4, Gender::Man, Orientation::LikesMen)));
    assert!(!is_mutually_compatible(&caller, &create_profile(5, Gender::Woman, Orientation::LikesMen)));
}

#[test]
fn test_gay_man_sees_gay_and_bi_men() {
    let caller = create_profile(1, Gender::Man, Orientation::LikesMen);

    assert!(is_mutually_compatible(&caller, &create_profile(2, Gender::Man, Orientation::LikesMen)));
    assert!(is_mutually_compatible(&caller, &create_profile(3, Gender::Man, Orientation::LikesBoth)));
    assert!(!is_mutually_compatible(&caller, &create_profile(4, Gender::Man, Orientation::LikesWomen)));
    assert!(!is_mutually_compatible(&caller, &create_profile(5, Gender::Woman, Orientation::LikesBoth)));
}

#[test]
fn test_orientation_free_text() {
    assert_eq!(Orientation::normalize("Likes Women"), Orientation::LikesWomen);
    assert_eq!(Orientation::normalize("interested in men"), Orientation::LikesMen);
    assert_eq!(Orientation::normalize("something else"), Orientation::LikesBoth);
}

#[test]
fn test_suggestion_pipeline_in_memory() {
    let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let origin = Coordinates { latitude: 48.8566, longitude: 2.3522 };
    let params = FilterParams {
        min_age: Some(25),
        max_age: Some(35),
        min_fame: Some(5.0),
        max_distance_km: Some(30.0),
    };

    let mut criteria = vec![
        Criterion::Verified,
        Criterion::ExcludeProfile(1),
        Criterion::Compatible(resolve_clauses(Some(Gender::Man), Orientation::LikesWomen)),
    ];
    criteria.extend(build_filters(&params, Some(origin), today, AgeBounds::default()));

    let close = at(create_profile(2, Gender::Woman, Orientation::LikesMen), 48.87, 2.36);
    let far = at(create_profile(3, Gender::Woman, Orientation::LikesMen), 45.7640, 4.8357);
    let no_location = Candidate {
        profile: create_profile(4, Gender::Woman, Orientation::LikesBoth),
        location: None,
    };
    let mut too_young = at(create_profile(5, Gender::Woman, Orientation::LikesMen), 48.86, 2.35);
    too_young.profile.birthday = NaiveDate::from_ymd_opt(2004, 1, 1);
    let mut obscure = at(create_profile(6, Gender::Woman, Orientation::LikesMen), 48.86, 2.35);
    obscure.profile.fame_rating = 1.0;

    assert!(matches_all(&criteria, &close));
    assert!(!matches_all(&criteria, &far));
    assert!(matches_all(&criteria, &no_location));
    assert!(!matches_all(&criteria, &too_young));
    assert!(!matches_all(&criteria, &obscure));
}
