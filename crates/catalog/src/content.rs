//! Storefront content shown around the catalog: banners and contact details.

use serde::{Deserialize, Serialize};

use storefront_core::{BannerId, ContactId, DomainError, DomainResult, Entity, StoreInfoId};

use crate::category::validate_name;

/// Input for creating a banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBanner {
    pub title: String,
    pub subtitle: Option<String>,
    pub image: String,
    pub is_active: bool,
}

/// A home page banner. Inactive banners are kept but not shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    id: BannerId,
    title: String,
    subtitle: Option<String>,
    image: String,
    is_active: bool,
}

impl Banner {
    pub fn create(id: BannerId, new: NewBanner) -> DomainResult<Self> {
        validate_name("banner title", &new.title)?;
        Ok(Self {
            id,
            title: new.title,
            subtitle: new.subtitle.filter(|s| !s.trim().is_empty()),
            image: new.image,
            is_active: new.is_active,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

impl Entity for Banner {
    type Id = BannerId;

    fn id(&self) -> BannerId {
        self.id
    }
}

/// Social and phone contacts listed in the storefront footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub whatsapp: String,
    pub twitter: String,
    pub facebook: String,
    pub telegram: String,
    pub phone: String,
}

impl Entity for Contact {
    type Id = ContactId;

    fn id(&self) -> ContactId {
        self.id
    }
}

const MAX_INFO_NUMBER_LEN: usize = 15;

/// Store address block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub id: StoreInfoId,
    pub email: String,
    pub number: String,
    pub address: String,
}

impl StoreInfo {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.email.contains('@') {
            return Err(DomainError::validation("email must contain '@'"));
        }
        if self.number.chars().count() > MAX_INFO_NUMBER_LEN {
            return Err(DomainError::validation(format!(
                "number cannot exceed {MAX_INFO_NUMBER_LEN} characters"
            )));
        }
        validate_name("address", &self.address)
    }
}

impl Entity for StoreInfo {
    type Id = StoreInfoId;

    fn id(&self) -> StoreInfoId {
        self.id
    }
}
