use serde::{Deserialize, Serialize};

use storefront_core::{CategoryId, DomainError, DomainResult, Entity};

pub(crate) const MAX_NAME_LEN: usize = 255;

pub(crate) fn validate_name(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Input for creating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub title: String,
    /// Path of the category picture in external image storage.
    pub image: String,
}

impl NewCategory {
    pub fn validate(&self) -> DomainResult<()> {
        validate_name("category name", &self.name)
    }
}

/// A product category. Deleting one deletes every product in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
    title: String,
    image: String,
}

impl Category {
    pub fn create(id: CategoryId, new: NewCategory) -> DomainResult<Self> {
        new.validate()?;
        Ok(Self {
            id,
            name: new.name,
            title: new.title,
            image: new.image,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> CategoryId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            title: "Fresh from the farm".to_string(),
            image: "category_img/fruit.png".to_string(),
        }
    }

    #[test]
    fn create_keeps_fields() {
        let category = Category::create(CategoryId::new(1), new_category("Fruit")).unwrap();
        assert_eq!(category.id(), CategoryId::new(1));
        assert_eq!(category.name(), "Fruit");
        assert_eq!(category.image(), "category_img/fruit.png");
    }

    #[test]
    fn create_rejects_blank_and_overlong_names() {
        let err = Category::create(CategoryId::new(1), new_category("  ")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let long = "x".repeat(MAX_NAME_LEN + 1);
        let err = Category::create(CategoryId::new(1), new_category(&long)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
