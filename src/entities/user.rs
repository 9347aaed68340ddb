// 👤 User - account record, only persisted so the store can seed an admin
//
// Password hashing and login live outside this crate.

use crate::error::Result;
use crate::serializer::{Entity, Reader, Serializable, Writer};
use serde::Serialize;

pub const DEFAULT_STATUS: &str = "unconfirmed";
pub const DEFAULT_ROLE: &str = "USER";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    id: Option<i64>,
    name: Option<String>,
    email: Option<String>,
    status: String,
    role: String,
}

impl Default for User {
    fn default() -> Self {
        User {
            id: None,
            name: None,
            email: None,
            status: DEFAULT_STATUS.to_string(),
            role: DEFAULT_ROLE.to_string(),
        }
    }
}

impl User {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<&str>) {
        self.name = name.map(String::from);
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn set_email(&mut self, email: Option<&str>) {
        self.email = email.map(String::from);
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn set_role(&mut self, role: &str) {
        self.role = role.to_string();
    }

    pub fn is_admin(&self) -> bool {
        self.role == "ADMIN"
    }
}

impl Serializable for User {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.name = reader.read_string("name")?;
        self.email = reader.read_string("email")?;
        self.status = reader
            .read_string("status")?
            .unwrap_or_else(|| DEFAULT_STATUS.to_string());
        self.role = reader
            .read_string("role")?
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());
        Ok(())
    }

    fn write_to(&mut self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_string("name", self.name.as_deref())?;
        writer.write_string("email", self.email.as_deref())?;
        writer.write_string("status", Some(self.status.as_str()))?;
        writer.write_string("role", Some(self.role.as_str()))
    }
}

impl Entity for User {
    const TYPE_NAME: &'static str = "User";
    const TABLE: &'static str = "users";

    fn with_id(id: i64) -> Self {
        User {
            id: Some(id),
            ..Default::default()
        }
    }
}
