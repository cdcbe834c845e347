//! Account storage: unique emails and the last-admin guard

#[path = "../common/mod.rs"]
mod common;
use common::*;

use appmart::error::AppError;

#[test]
fn test_email_is_unique_case_insensitively() {
    let ctx = create_test_app_state();
    let conn = ctx.conn();
    create_test_user(&conn, "Ana", "ana@example.com");

    let input = CreateUser {
        name: "Other Ana".to_string(),
        email: "  ANA@Example.com ".to_string(),
        password: TEST_PASSWORD.to_string(),
    };
    let err = queries::create_user(&conn, &input, "hash", UserRole::User).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let found = queries::get_user_by_email(&conn, "Ana@EXAMPLE.com").unwrap();
    assert_eq!(found.unwrap().name, "Ana");
}

#[test]
fn test_last_admin_cannot_be_deleted() {
    let ctx = create_test_app_state();
    let conn = ctx.conn();
    let admin = create_test_admin(&conn, "root@example.com");

    let err = queries::delete_user(&conn, &admin.id).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(queries::count_admins(&conn).unwrap(), 1);

    let second = create_test_admin(&conn, "second@example.com");
    assert!(queries::delete_user(&conn, &admin.id).unwrap());
    assert_eq!(queries::count_admins(&conn).unwrap(), 1);

    let err = queries::delete_user(&conn, &second.id).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn test_delete_unknown_user_is_not_found() {
    let ctx = create_test_app_state();
    let conn = ctx.conn();

    let err = queries::delete_user(&conn, "no-such-user").unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_role_change_and_password_reset() {
    let ctx = create_test_app_state();
    let conn = ctx.conn();
    let user = create_test_user(&conn, "Dev", "dev@example.com");

    assert!(queries::set_user_role(&conn, &user.id, UserRole::Admin).unwrap());
    assert!(queries::set_user_password(&conn, &user.id, "new-hash").unwrap());

    let stored = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert!(stored.is_admin());
    assert_eq!(stored.password_hash, "new-hash");

    assert!(!queries::set_user_role(&conn, "missing", UserRole::Admin).unwrap());
}

#[test]
fn test_create_user_validation() {
    let bad_email = CreateUser {
        name: "X".to_string(),
        email: "not-an-email".to_string(),
        password: TEST_PASSWORD.to_string(),
    };
    assert!(bad_email.validate().is_err());

    let short_password = CreateUser {
        name: "X".to_string(),
        email: "x@example.com".to_string(),
        password: "12345".to_string(),
    };
    assert!(short_password.validate().is_err());

    let blank_name = CreateUser {
        name: "   ".to_string(),
        email: "x@example.com".to_string(),
        password: TEST_PASSWORD.to_string(),
    };
    assert!(blank_name.validate().is_err());
}
