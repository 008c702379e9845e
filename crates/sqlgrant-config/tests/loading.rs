use std::path::Path;

use sqlgrant_config::{load_connection, load_manifests};
use sqlgrant_domain::{DatabaseId, ResourceModel};

fn fixtures() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn load_connection_fixture() {
    let config = load_connection(&fixtures().join("connection.yml")).expect("should load without error");

    assert_eq!(config.host, "sql.example.internal");
    assert_eq!(config.port, 14330);
    assert_eq!(config.database.as_deref(), Some("master"));
    assert!(config.trust_cert);
    assert_eq!(config.statement_timeout, Some(std::time::Duration::from_secs(30)));
}

#[test]
fn load_manifest_directory_in_file_order() {
    let resources = load_manifests(&fixtures().join("manifests")).expect("should load without error");

    let kinds: Vec<&str> = resources.iter().map(ResourceModel::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "sql_login",
            "server_role",
            "server_role_member",
            "schema",
            "azuread_user",
            "database_role_member",
            "schema_permission",
        ]
    );

    let ResourceModel::SqlLogin(login) = &resources[0] else {
        panic!("expected a login, got {:?}", resources[0]);
    };
    assert_eq!(login.default_database_id, DatabaseId(5));
    assert!(!login.check_password_expiration);
    assert!(login.check_password_policy);

    let ResourceModel::AzureadUser(user) = &resources[4] else {
        panic!("expected an Azure AD user, got {:?}", resources[4]);
    };
    assert_eq!(user.user_object_id.to_string(), "A80E3C16-88A3-4218-AB27-4E25EF196BBF");

    let ResourceModel::SchemaPermission(grant) = &resources[6] else {
        panic!("expected a schema permission, got {:?}", resources[6]);
    };
    assert_eq!(grant.permission.as_str(), "SELECT");
    assert!(grant.with_grant_option);
}

#[test]
fn single_manifest_file() {
    let resources = load_manifests(&fixtures().join("manifests/10-server.yml")).unwrap();
    assert_eq!(resources.len(), 3);
    assert_eq!(resources[1].id(), Some("270"));
}

#[test]
fn missing_file_returns_error() {
    assert!(load_manifests(Path::new("/nonexistent/path/does/not/exist.yml")).is_err());
    assert!(load_connection(Path::new("/nonexistent/path/connection.yml")).is_err());
}
