pub mod blood_request;
pub mod notification;
pub mod user;

use bloodlink_sdk::objects::{BloodType as SdkBloodType, UserRole as SdkUserRole};

/// Blood type for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `bloodlink_sdk::objects::BloodType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "blood_type")]
pub enum BloodType {
    #[sqlx(rename = "A+")]
    APositive,
    #[sqlx(rename = "A-")]
    ANegative,
    #[sqlx(rename = "B+")]
    BPositive,
    #[sqlx(rename = "B-")]
    BNegative,
    #[sqlx(rename = "AB+")]
    AbPositive,
    #[sqlx(rename = "AB-")]
    AbNegative,
    #[sqlx(rename = "O+")]
    OPositive,
    #[sqlx(rename = "O-")]
    ONegative,
}

impl std::fmt::Display for BloodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(SdkBloodType::from(*self).as_str())
    }
}

impl From<BloodType> for SdkBloodType {
    fn from(value: BloodType) -> Self {
        match value {
            BloodType::APositive => SdkBloodType::APositive,
            BloodType::ANegative => SdkBloodType::ANegative,
            BloodType::BPositive => SdkBloodType::BPositive,
            BloodType::BNegative => SdkBloodType::BNegative,
            BloodType::AbPositive => SdkBloodType::AbPositive,
            BloodType::AbNegative => SdkBloodType::AbNegative,
            BloodType::OPositive => SdkBloodType::OPositive,
            BloodType::ONegative => SdkBloodType::ONegative,
        }
    }
}

impl From<SdkBloodType> for BloodType {
    fn from(value: SdkBloodType) -> Self {
        match value {
            SdkBloodType::APositive => BloodType::APositive,
            SdkBloodType::ANegative => BloodType::ANegative,
            SdkBloodType::BPositive => BloodType::BPositive,
            SdkBloodType::BNegative => BloodType::BNegative,
            SdkBloodType::AbPositive => BloodType::AbPositive,
            SdkBloodType::AbNegative => BloodType::AbNegative,
            SdkBloodType::OPositive => BloodType::OPositive,
            SdkBloodType::ONegative => BloodType::ONegative,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "user_role")]
pub enum UserRole {
    Donor,
    Seeker,
    Admin,
}

impl From<UserRole> for SdkUserRole {
    fn from(value: UserRole) -> Self {
        match value {
            UserRole::Donor => SdkUserRole::Donor,
            UserRole::Seeker => SdkUserRole::Seeker,
            UserRole::Admin => SdkUserRole::Admin,
        }
    }
}

impl From<SdkUserRole> for UserRole {
    fn from(value: SdkUserRole) -> Self {
        match value {
            SdkUserRole::Donor => UserRole::Donor,
            SdkUserRole::Seeker => UserRole::Seeker,
            SdkUserRole::Admin => UserRole::Admin,
        }
    }
}
