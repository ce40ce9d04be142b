use chrono::{Duration, NaiveDate, Utc};
use jirafa_shared::api::{UpdateKidReq, endpoints};
use jirafa_shared::auth::Role;
use jirafa_shared::domain::{Sex, format_date, kid_username, parse_date};
use jirafa_shared::jwt::{self, JwtClaims};
use jirafa_shared::path::{api_segments, kid_username_from_path};

#[test]
fn dates_accept_three_layouts() {
    let expected = NaiveDate::from_ymd_opt(2020, 3, 15);
    assert_eq!(parse_date("15/03/2020"), expected);
    assert_eq!(parse_date("2020-03-15"), expected);
    assert_eq!(parse_date(" 2020/03/15 "), expected);
    assert_eq!(parse_date("2020-13-01"), None);
    assert_eq!(parse_date("yesterday"), None);
    assert_eq!(format_date(expected.unwrap()), "2020-03-15");
}

#[test]
fn sex_parses_words_and_initials() {
    assert_eq!("F".parse::<Sex>().unwrap(), Sex::Female);
    assert_eq!(" male ".parse::<Sex>().unwrap(), Sex::Male);
    assert_eq!("m".parse::<Sex>().unwrap(), Sex::Male);
    assert!("other".parse::<Sex>().is_err());
    assert_eq!(Sex::Female.to_string(), "female");
}

#[test]
fn kid_usernames_follow_the_generated_pattern() {
    assert_eq!(kid_username("Ana", Sex::Female, 42), "kid_an_f00042");
    assert_eq!(kid_username("Élodie", Sex::Female, 1), "kid_el_f00001");
    assert_eq!(kid_username("  ", Sex::Male, 7), "kid_xx_m00007");
    assert_eq!(kid_username("!?", Sex::Male, 123_456), "kid_xx_m23456");
}

#[test]
fn patch_distinguishes_null_from_absent() {
    let absent: UpdateKidReq = serde_json::from_str(r#"{"name":"Leo"}"#).unwrap();
    assert_eq!(absent.premature_date, None);
    assert_eq!(absent.name.as_deref(), Some("Leo"));

    let cleared: UpdateKidReq = serde_json::from_str(r#"{"premature_date":null}"#).unwrap();
    assert_eq!(cleared.premature_date, Some(None));

    let set: UpdateKidReq =
        serde_json::from_str(r#"{"premature_date":"2020-01-01","gender":"f"}"#).unwrap();
    assert_eq!(set.premature_date, Some(Some("2020-01-01".to_string())));
    assert_eq!(set.sex.as_deref(), Some("f"));
}

#[test]
fn api_paths_split_into_decoded_segments() {
    assert_eq!(
        api_segments("/api/v1/kids/kid_an_f00042/height/3"),
        Some(vec![
            "kids".to_string(),
            "kid_an_f00042".to_string(),
            "height".to_string(),
            "3".to_string()
        ])
    );
    assert_eq!(api_segments("/api/v10/kids"), None);
    assert_eq!(api_segments("/healthz"), None);
    assert_eq!(
        kid_username_from_path("/api/v1/kids/kid%5Fan%5Ff00042/history").as_deref(),
        Some("kid_an_f00042")
    );
    assert_eq!(kid_username_from_path("/api/v1/families/ana"), None);
}

#[test]
fn endpoint_builders_encode_usernames() {
    let url = endpoints::kid_height_record("http://host/", "kid_an_f00042", 7);
    assert_eq!(url, "http://host/api/v1/kids/kid%5Fan%5Ff00042/height/7");
    assert_eq!(
        kid_username_from_path(url.trim_start_matches("http://host")).as_deref(),
        Some("kid_an_f00042")
    );
    assert_eq!(endpoints::family("http://host", "a b"), "http://host/api/v1/families/a%20b");
}

#[test]
fn jwt_verifies_only_with_the_signing_secret() {
    let claims = JwtClaims {
        sub: "kid_an_f00042".into(),
        jti: "session-1".into(),
        exp: (Utc::now() + Duration::days(1)).timestamp(),
        role: Role::Kid,
    };
    let token = jwt::encode(&claims, b"secret").unwrap();
    let decoded = jwt::decode_and_verify(&token, b"secret").unwrap();
    assert_eq!(decoded.sub, claims.sub);
    assert_eq!(decoded.role, Role::Kid);
    assert!(jwt::decode_and_verify(&token, b"other").is_err());

    let expired = JwtClaims {
        exp: (Utc::now() - Duration::days(1)).timestamp(),
        ..claims
    };
    let token = jwt::encode(&expired, b"secret").unwrap();
    assert!(jwt::decode_and_verify(&token, b"secret").is_err());
}
