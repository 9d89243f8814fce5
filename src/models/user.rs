use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

const MAX_NAME_LEN: usize = 255;
const MAX_USERNAME_LEN: usize = 50;
const MAX_EMAIL_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 6;
// bcrypt ignores everything past 72 bytes
const MAX_PASSWORD_BYTES: usize = 72;
const MAX_LOCATION_LEN: usize = 255;
const MAX_BIO_LEN: usize = 280;
const MAX_WEBSITE_URL_LEN: usize = 255;

/// A registered account. The password column holds a bcrypt hash and is
/// never written to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub website_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /signup`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `PUT /account/update_profile`. Every attribute is replaced, so
/// an omitted optional field clears the stored value.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub website_url: Option<String>,
}

impl User {
    pub fn new(name: String, username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();

        User {
            id: Uuid::new_v4(),
            name,
            username,
            email,
            password: password_hash,
            location: None,
            bio: None,
            website_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the profile attributes with a normalized update and bumps
    /// `updated_at`. The password and timestamps of creation are untouched.
    pub fn apply_profile(&mut self, update: UpdateProfileRequest) {
        let update = update.normalized();

        self.name = update.name;
        self.username = update.username;
        self.email = update.email;
        self.location = update.location;
        self.bio = update.bio;
        self.website_url = update.website_url;

        self.updated_at = Utc::now();
    }
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)?;
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        Ok(())
    }

    /// Trims the identity fields, lowercases the email and attaches the
    /// already hashed password.
    pub fn into_user(self, password_hash: String) -> User {
        User::new(
            self.name.trim().to_string(),
            self.username.trim().to_string(),
            normalize_email(&self.email),
            password_hash,
        )
    }
}

impl LoginRequest {
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)?;
        validate_username(&self.username)?;
        validate_email(&self.email)?;

        if let Some(location) = non_blank(&self.location) {
            if location.chars().count() > MAX_LOCATION_LEN {
                return Err(format!("Location cannot exceed {} characters", MAX_LOCATION_LEN));
            }
        }

        if let Some(bio) = non_blank(&self.bio) {
            if bio.chars().count() > MAX_BIO_LEN {
                return Err(format!("Bio cannot exceed {} characters", MAX_BIO_LEN));
            }
        }

        if let Some(url) = non_blank(&self.website_url) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Website URL must start with http:// or https://".to_string());
            }

            if url.len() > MAX_WEBSITE_URL_LEN {
                return Err(format!("Website URL cannot exceed {} characters", MAX_WEBSITE_URL_LEN));
            }
        }

        Ok(())
    }

    /// Trims every field, lowercases the email and turns blank optional
    /// fields into `None`.
    pub fn normalized(self) -> Self {
        UpdateProfileRequest {
            name: self.name.trim().to_string(),
            username: self.username.trim().to_string(),
            email: normalize_email(&self.email),
            location: non_blank(&self.location).map(str::to_string),
            bio: non_blank(&self.bio).map(str::to_string),
            website_url: non_blank(&self.website_url).map(str::to_string),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();

    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Name cannot exceed {} characters", MAX_NAME_LEN));
    }

    Ok(())
}

fn validate_username(username: &str) -> Result<(), String> {
    let username = username.trim();

    if username.is_empty() {
        return Err("Username cannot be empty".to_string());
    }

    if username.len() > MAX_USERNAME_LEN {
        return Err(format!("Username cannot exceed {} characters", MAX_USERNAME_LEN));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Username may only contain letters, numbers and underscores".to_string());
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();

    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(format!("Email cannot exceed {} characters", MAX_EMAIL_LEN));
    }

    if !is_valid_email(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!("Password must be at least {} characters", MIN_PASSWORD_LEN));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(format!("Password cannot exceed {} bytes", MAX_PASSWORD_BYTES));
    }

    Ok(())
}

/// Structural email check: exactly one `@`, a bounded local part, and a
/// dotted domain made of letters, digits, dots and hyphens.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }

    if domain.is_empty() || domain.len() > 253 || !domain.contains('.') {
        return false;
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    local.chars().all(|c| c.is_alphanumeric() || ".-_+".contains(c))
        && domain.chars().all(|c| c.is_alphanumeric() || ".-".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(name: &str, username: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: name.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn profile_update() -> UpdateProfileRequest {
        UpdateProfileRequest {
            name: "Ada Lovelace".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            location: Some("London".to_string()),
            bio: Some("First programmer".to_string()),
            website_url: Some("https://ada.example.com".to_string()),
        }
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup("Ada", "ada_l", "ada@example.com", "secret1").validate().is_ok());

        assert!(signup("  ", "ada", "ada@example.com", "secret1").validate().is_err());
        assert!(signup("Ada", "", "ada@example.com", "secret1").validate().is_err());
        assert!(signup("Ada", "ada lovelace", "ada@example.com", "secret1").validate().is_err());
        assert!(signup("Ada", "ada", "not-an-email", "secret1").validate().is_err());
        assert!(signup("Ada", "ada", "ada@example.com", "short").validate().is_err());
        assert!(signup("Ada", "ada", "ada@example.com", &"x".repeat(73)).validate().is_err());
    }

    #[test]
    fn test_signup_into_user_normalizes() {
        let user = signup(" Ada ", " ada ", " Ada@Example.COM ", "secret1")
            .into_user("$2b$04$hash".to_string());

        assert_ne!(user.id, Uuid::nil());
        assert_eq!(user.name, "Ada");
        assert_eq!(user.username, "ada");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.password, "$2b$04$hash");
        assert_eq!(user.location, None);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_password_is_never_serialized() {
        let user = User::new(
            "Ada".to_string(),
            "ada".to_string(),
            "ada@example.com".to_string(),
            "$2b$04$hash".to_string(),
        );

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "ada");
        assert_eq!(json["website_url"], serde_json::Value::Null);
    }

    #[test]
    fn test_update_profile_validation() {
        assert!(profile_update().validate().is_ok());

        let mut bad_url = profile_update();
        bad_url.website_url = Some("ftp://ada.example.com".to_string());
        assert_eq!(
            bad_url.validate().unwrap_err(),
            "Website URL must start with http:// or https://"
        );

        let mut long_bio = profile_update();
        long_bio.bio = Some("b".repeat(281));
        assert!(long_bio.validate().is_err());

        let mut blank_optional = profile_update();
        blank_optional.website_url = Some("   ".to_string());
        blank_optional.location = None;
        assert!(blank_optional.validate().is_ok());
    }

    #[test]
    fn test_apply_profile_replaces_every_field() {
        let mut user = User::new(
            "Ada".to_string(),
            "ada".to_string(),
            "ada@example.com".to_string(),
            "$2b$04$hash".to_string(),
        );
        user.bio = Some("old bio".to_string());
        let created_at = user.created_at;
        let original_updated_at = user.updated_at;

        std::thread::sleep(std::time::Duration::from_millis(1));

        let update = UpdateProfileRequest {
            name: " Augusta Ada ".to_string(),
            username: "countess".to_string(),
            email: "COUNTESS@Example.com".to_string(),
            location: Some(" Marylebone ".to_string()),
            bio: None,
            website_url: Some("".to_string()),
        };
        user.apply_profile(update);

        assert_eq!(user.name, "Augusta Ada");
        assert_eq!(user.username, "countess");
        assert_eq!(user.email, "countess@example.com");
        assert_eq!(user.location.as_deref(), Some("Marylebone"));
        assert_eq!(user.bio, None);
        assert_eq!(user.website_url, None);
        assert_eq!(user.password, "$2b$04$hash");
        assert_eq!(user.created_at, created_at);
        assert!(user.updated_at > original_updated_at);
    }

    #[test]
    fn test_update_profile_missing_optionals_deserialize_as_none() {
        let json = r#"{"name":"Ada","username":"ada","email":"ada@example.com"}"#;
        let request: UpdateProfileRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.location, None);
        assert_eq!(request.bio, None);
        assert_eq!(request.website_url, None);

        let missing_required = r#"{"name":"Ada","email":"ada@example.com"}"#;
        assert!(serde_json::from_str::<UpdateProfileRequest>(missing_required).is_err());
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.co.uk"));
        assert!(is_valid_email("user+tag@example.org"));

        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@domain"));
        assert!(!is_valid_email("a@b@example.com"));
        assert!(!is_valid_email("user@.example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_login_email_is_normalized() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email":" Ada@Example.com ","password":"secret1"}"#).unwrap();
        assert_eq!(request.normalized_email(), "ada@example.com");
    }
}
