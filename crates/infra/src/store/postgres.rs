//! PostgreSQL storefront store.
//!
//! Mirrors `InMemoryStore` operation for operation. Multi-row writes run in a
//! single `sqlx::Transaction`; an early `?` drops the transaction, which rolls
//! it back.
//!
//! The ledger path locks the product row with `SELECT ... FOR UPDATE` so two
//! concurrent entries against one product serialize instead of losing an
//! update. Reconciliation itself is `storefront_inventory::plan`, shared with
//! the in-memory adapter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Executor, FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use storefront_catalog::{
    Banner, Category, Contact, NewBanner, NewCategory, NewProduct, NewProductImage, Page,
    Paginator, Product, ProductImage, StoreInfo,
};
use storefront_core::{
    BannerId, CartId, CartLineId, CategoryId, ContactId, DomainError, Entity, Money, OrderId,
    ProductId, ProductImageId, StockEntryId, StoreInfoId, UserId, WishlistEntryId,
};
use storefront_inventory::{EntryWrite, LedgerPlan, RecordStockEntry, StockEntry, plan};
use storefront_sales::{
    Cart, CartLine, NewCartLine, Order, OrderContact, OrderStatus, WishlistEntry,
};

use super::CartOwner;
use crate::config::StorefrontConfig;
use crate::error::{StoreError, StoreResult, map_sqlx_error};
use crate::home::HomePage;
use crate::ledger::{Recorded, log_outcome};

const SCHEMA: &str = include_str!("../../migrations/0001_storefront.sql");
const MIGRATION_LOCK_KEY: i64 = 0x5354_4f52_4546_524e;

const PRODUCT_COLUMNS: &str = "id, category_id, name, quantity, price_minor, description";
const STOCK_ENTRY_COLUMNS: &str = "id, product_id, quantity, prior_quantity, notes, recorded_at";
const CART_LINE_COLUMNS: &str = "id, cart_id, image_id, product_id, quantity, total_minor";
const ORDER_COLUMNS: &str = "id, cart_id, full_name, email, phone, address, status";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool sized by the configuration.
    pub async fn connect(config: &StorefrontConfig) -> StoreResult<Self> {
        let url = config
            .require_database_url()
            .map_err(|e| StoreError::backend("connect", e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema. Every statement is idempotent, and an
    /// advisory lock keeps concurrent callers from racing on the DDL.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        let mut tx = self.begin("migrate").await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        sqlx::raw_sql(SCHEMA)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        info!("storefront schema applied");
        Ok(())
    }

    async fn begin(&self, operation: &'static str) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Read-only transaction whose statements all see one snapshot, so a
    /// page count and the page rows agree.
    async fn begin_snapshot(
        &self,
        operation: &'static str,
    ) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self.begin(operation).await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(tx)
    }

    // --- inventory ledger --------------------------------------------------

    /// Create or edit a stock entry and adjust the product's on-hand count
    /// in one transaction.
    #[instrument(
        skip(self, command),
        fields(product_id = %command.product_id, edit = command.is_edit())
    )]
    pub async fn record_stock_entry(&self, command: &RecordStockEntry) -> StoreResult<Recorded> {
        let result = self.apply_stock_entry(command).await;
        log_outcome(command, &result);
        result
    }

    /// The steps of `ledger::apply` against a sqlx transaction: lock the
    /// product, load the entry, `plan`, write the product, write the entry.
    async fn apply_stock_entry(&self, command: &RecordStockEntry) -> StoreResult<Recorded> {
        let mut tx = self.begin("record_stock_entry").await?;

        let on_hand: i64 = sqlx::query("SELECT quantity FROM products WHERE id = $1 FOR UPDATE")
            .bind(command.product_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("record_stock_entry", e))?
            .map(|row| row.try_get("quantity"))
            .transpose()
            .map_err(|e| map_sqlx_error("record_stock_entry", e))?
            .ok_or_else(|| StoreError::not_found("product", command.product_id))?;

        let previous = match command.entry_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {STOCK_ENTRY_COLUMNS} FROM stock_entries WHERE id = $1 FOR UPDATE"
                );
                sqlx::query_as::<_, StockEntryRow>(&sql)
                    .bind(id.get())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("record_stock_entry", e))?
                    .map(StockEntryRow::into_entry)
            }
            None => None,
        };

        let LedgerPlan {
            product_id,
            on_hand_before,
            on_hand_after,
            entry,
            ..
        } = plan(command, on_hand, previous.as_ref())?;

        sqlx::query("UPDATE products SET quantity = $2 WHERE id = $1")
            .bind(product_id.get())
            .bind(on_hand_after)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("record_stock_entry", e))?;

        let entry = match entry {
            EntryWrite::Insert(new) => {
                let sql = format!(
                    "INSERT INTO stock_entries \
                     (product_id, quantity, prior_quantity, notes, recorded_at) \
                     VALUES ($1, $2, $3, $4, $5) RETURNING {STOCK_ENTRY_COLUMNS}"
                );
                sqlx::query_as::<_, StockEntryRow>(&sql)
                    .bind(new.product_id.get())
                    .bind(new.quantity)
                    .bind(new.prior_quantity)
                    .bind(&new.notes)
                    .bind(new.recorded_at)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("record_stock_entry", e))?
                    .into_entry()
            }
            EntryWrite::Update(entry) => {
                sqlx::query(
                    "UPDATE stock_entries SET quantity = $2, prior_quantity = $3, notes = $4 \
                     WHERE id = $1",
                )
                .bind(entry.id.get())
                .bind(entry.quantity)
                .bind(entry.prior_quantity)
                .bind(&entry.notes)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("record_stock_entry", e))?;
                entry
            }
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("record_stock_entry", e))?;

        Ok(Recorded {
            entry,
            on_hand_before,
            on_hand_after,
        })
    }

    /// Stock-entry history of a product in creation order.
    pub async fn stock_entries_for(&self, product_id: ProductId) -> StoreResult<Vec<StockEntry>> {
        let sql = format!(
            "SELECT {STOCK_ENTRY_COLUMNS} FROM stock_entries WHERE product_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, StockEntryRow>(&sql)
            .bind(product_id.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock_entries_for", e))?;
        Ok(rows.into_iter().map(StockEntryRow::into_entry).collect())
    }

    // --- catalog -----------------------------------------------------------

    #[instrument(skip(self, new), err)]
    pub async fn create_category(&self, new: NewCategory) -> StoreResult<Category> {
        new.validate()?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (name, title, image) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.title)
        .bind(&new.image)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_category", e))?;
        debug!(category_id = id, "category created");
        Ok(Category::create(CategoryId::new(id), new)?)
    }

    pub async fn category(&self, id: CategoryId) -> StoreResult<Category> {
        let row = sqlx::query("SELECT id, name, title, image FROM categories WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("category", e))?
            .ok_or_else(|| StoreError::not_found("category", id))?;
        decode_category(&row)
    }

    pub async fn categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, title, image FROM categories ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("categories", e))?;
        rows.iter().map(decode_category).collect()
    }

    /// Products, images, stock entries and wishlist rows go with it through
    /// the foreign keys.
    #[instrument(skip(self), fields(category_id = %id), err)]
    pub async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("category", id));
        }
        info!("category deleted");
        Ok(())
    }

    #[instrument(skip(self, new), fields(category_id = %new.category_id), err)]
    pub async fn create_product(&self, new: NewProduct) -> StoreResult<Product> {
        new.validate()?;
        let sql = format!(
            "INSERT INTO products (category_id, name, quantity, price_minor, description) \
             SELECT id, $2, $3, $4, $5 FROM categories WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(new.category_id.get())
            .bind(&new.name)
            .bind(new.quantity)
            .bind(money_column(new.price)?)
            .bind(&new.description)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_product", e))?
            .ok_or_else(|| StoreError::not_found("category", new.category_id))?;
        debug!(product_id = row.id, "product created");
        row.into_product()
    }

    pub async fn product(&self, id: ProductId) -> StoreResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("product", e))?
            .ok_or_else(|| StoreError::not_found("product", id))?
            .into_product()
    }

    /// One page of products, newest first, optionally within a category.
    pub async fn products_page(
        &self,
        paginator: &Paginator,
        category: Option<CategoryId>,
        requested: Option<&str>,
    ) -> StoreResult<Page<Product>> {
        let category = category.map(CategoryId::get);
        let mut tx = self.begin_snapshot("products_page").await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE $1::BIGINT IS NULL OR category_id = $1",
        )
        .bind(category)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("products_page", e))?;

        let window = paginator.resolve(count_column(total), requested);
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE $1::BIGINT IS NULL OR category_id = $1 \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(category)
            .bind(window.len as i64)
            .bind(window.offset as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("products_page", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("products_page", e))?;

        let items = rows
            .into_iter()
            .map(ProductRow::into_product)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::from_window(window, items))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product", id));
        }
        info!("product deleted");
        Ok(())
    }

    pub async fn create_product_image(&self, new: NewProductImage) -> StoreResult<ProductImage> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO product_images (product_id, image) \
             SELECT id, $2 FROM products WHERE id = $1 RETURNING id",
        )
        .bind(new.product_id.get())
        .bind(&new.image)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product_image", e))?
        .ok_or_else(|| StoreError::not_found("product", new.product_id))?;
        Ok(ProductImage::create(ProductImageId::new(id), new)?)
    }

    /// One page of product images, newest first.
    pub async fn product_images_page(
        &self,
        paginator: &Paginator,
        requested: Option<&str>,
    ) -> StoreResult<Page<ProductImage>> {
        let mut tx = self.begin_snapshot("product_images_page").await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_images")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("product_images_page", e))?;

        let window = paginator.resolve(count_column(total), requested);
        let rows = sqlx::query(
            "SELECT id, product_id, image FROM product_images ORDER BY id DESC LIMIT $1 OFFSET $2",
        )
        .bind(window.len as i64)
        .bind(window.offset as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("product_images_page", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("product_images_page", e))?;

        let items = rows
            .iter()
            .map(decode_product_image)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::from_window(window, items))
    }

    pub async fn delete_product_image(&self, id: ProductImageId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM product_images WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product_image", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product image", id));
        }
        Ok(())
    }

    // --- storefront content ------------------------------------------------

    pub async fn create_banner(&self, new: NewBanner) -> StoreResult<Banner> {
        let id = BannerId::new(next_id(&*self.pool, "banners").await?);
        let banner = Banner::create(id, new)?;
        sqlx::query(
            "INSERT INTO banners (id, title, subtitle, image, is_active) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id.get())
        .bind(banner.title())
        .bind(banner.subtitle())
        .bind(banner.image())
        .bind(banner.is_active())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_banner", e))?;
        Ok(banner)
    }

    pub async fn deactivate_banner(&self, id: BannerId) -> StoreResult<()> {
        let result = sqlx::query("UPDATE banners SET is_active = FALSE WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("deactivate_banner", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("banner", id));
        }
        Ok(())
    }

    pub async fn active_banners(&self) -> StoreResult<Vec<Banner>> {
        let rows = sqlx::query(
            "SELECT id, title, subtitle, image, is_active FROM banners WHERE is_active ORDER BY id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_banners", e))?;
        rows.iter().map(decode_banner).collect()
    }

    pub async fn contacts(&self) -> StoreResult<Vec<Contact>> {
        let rows = sqlx::query(
            "SELECT id, whatsapp, twitter, facebook, telegram, phone FROM contacts ORDER BY id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("contacts", e))?;
        rows.iter()
            .map(|row| decode_contact(row).map_err(|e| map_sqlx_error("contacts", e)))
            .collect()
    }

    /// Stores the contact under a freshly assigned id (the incoming id is ignored).
    pub async fn add_contact(&self, mut contact: Contact) -> StoreResult<Contact> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO contacts (whatsapp, twitter, facebook, telegram, phone) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&contact.whatsapp)
        .bind(&contact.twitter)
        .bind(&contact.facebook)
        .bind(&contact.telegram)
        .bind(&contact.phone)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_contact", e))?;
        contact.id = ContactId::new(id);
        Ok(contact)
    }

    /// Stores the address block under a freshly assigned id.
    pub async fn add_store_info(&self, mut info: StoreInfo) -> StoreResult<StoreInfo> {
        info.validate()?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO store_infos (email, number, address) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&info.email)
        .bind(&info.number)
        .bind(&info.address)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_store_info", e))?;
        info.id = StoreInfoId::new(id);
        Ok(info)
    }

    pub async fn store_infos(&self) -> StoreResult<Vec<StoreInfo>> {
        let rows = sqlx::query("SELECT id, email, number, address FROM store_infos ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("store_infos", e))?;
        rows.iter()
            .map(|row| -> Result<StoreInfo, sqlx::Error> {
                Ok(StoreInfo {
                    id: StoreInfoId::new(row.try_get("id")?),
                    email: row.try_get("email")?,
                    number: row.try_get("number")?,
                    address: row.try_get("address")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("store_infos", e))
    }

    /// Banners, categories, one page of product images, the viewer's
    /// wishlist and contacts.
    #[instrument(skip(self, paginator), err)]
    pub async fn home_page(
        &self,
        paginator: &Paginator,
        viewer: Option<UserId>,
        requested: Option<&str>,
    ) -> StoreResult<HomePage> {
        let wishlist = match viewer {
            Some(user) => self.wishlist(user).await?,
            None => Vec::new(),
        };
        Ok(HomePage {
            banners: self.active_banners().await?,
            categories: self.categories().await?,
            products: self.product_images_page(paginator, requested).await?,
            wishlist,
            contacts: self.contacts().await?,
        })
    }

    // --- carts & orders ----------------------------------------------------

    /// Add `quantity` of an image variant to a cart, merging with an existing
    /// line for the same image and refreshing its cached total.
    #[instrument(skip(self), err)]
    pub async fn add_to_cart(
        &self,
        owner: CartOwner,
        image_id: ProductImageId,
        quantity: u32,
    ) -> StoreResult<CartLine> {
        let mut tx = self.begin("add_to_cart").await?;

        let row = sqlx::query(
            "SELECT i.product_id, p.price_minor FROM product_images i \
             JOIN products p ON p.id = i.product_id WHERE i.id = $1",
        )
        .bind(image_id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("add_to_cart", e))?
        .ok_or_else(|| StoreError::not_found("product image", image_id))?;
        let product_id = ProductId::new(
            row.try_get("product_id")
                .map_err(|e| map_sqlx_error("add_to_cart", e))?,
        );
        let unit_price = money_from_column(
            row.try_get("price_minor")
                .map_err(|e| map_sqlx_error("add_to_cart", e))?,
        )
        .map_err(|e| map_sqlx_error("add_to_cart", e))?;

        let cart_id = resolve_cart(&mut tx, owner).await?;

        let sql = format!(
            "SELECT {CART_LINE_COLUMNS} FROM cart_lines WHERE cart_id = $1 AND image_id = $2 \
             FOR UPDATE"
        );
        let existing = sqlx::query(&sql)
            .bind(cart_id.get())
            .bind(image_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_to_cart", e))?
            .map(|row| decode_cart_line(&row))
            .transpose()
            .map_err(|e| map_sqlx_error("add_to_cart", e))?;

        let line = match existing {
            Some(mut line) => {
                line.add_quantity(quantity, unit_price)?;
                sqlx::query("UPDATE cart_lines SET quantity = $2, total_minor = $3 WHERE id = $1")
                    .bind(line.id().get())
                    .bind(quantity_column(line.quantity())?)
                    .bind(line.total_price().map(money_column).transpose()?)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("add_to_cart", e))?;
                line
            }
            None => {
                let id = CartLineId::new(next_id(&mut *tx, "cart_lines").await?);
                let line = CartLine::create(
                    id,
                    cart_id,
                    NewCartLine {
                        image_id,
                        product_id,
                        quantity,
                    },
                    unit_price,
                )?;
                sqlx::query(
                    "INSERT INTO cart_lines \
                     (id, cart_id, image_id, product_id, quantity, total_minor) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(id.get())
                .bind(cart_id.get())
                .bind(image_id.get())
                .bind(product_id.get())
                .bind(quantity_column(line.quantity())?)
                .bind(line.total_price().map(money_column).transpose()?)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("add_to_cart", e))?;
                line
            }
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("add_to_cart", e))?;
        debug!(cart_id = %cart_id, quantity = line.quantity(), "cart line saved");
        Ok(line)
    }

    /// Removes a line from an active cart.
    pub async fn remove_cart_line(&self, id: CartLineId) -> StoreResult<()> {
        let mut tx = self.begin("remove_cart_line").await?;
        let cart = sqlx::query(
            "SELECT c.id, c.owner_id, c.is_active, c.shopping_date FROM cart_lines l \
             JOIN carts c ON c.id = l.cart_id WHERE l.id = $1 FOR UPDATE OF c",
        )
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("remove_cart_line", e))?
        .ok_or_else(|| StoreError::not_found("cart line", id))
        .and_then(|row| decode_cart(&row).map_err(|e| map_sqlx_error("remove_cart_line", e)))?;
        cart.ensure_active()?;

        sqlx::query("DELETE FROM cart_lines WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("remove_cart_line", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("remove_cart_line", e))
    }

    pub async fn active_cart_for(&self, user: UserId) -> StoreResult<Option<Cart>> {
        sqlx::query(
            "SELECT id, owner_id, is_active, shopping_date FROM carts \
             WHERE owner_id = $1 AND is_active ORDER BY id LIMIT 1",
        )
        .bind(user.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_cart_for", e))?
        .map(|row| decode_cart(&row))
        .transpose()
        .map_err(|e| map_sqlx_error("active_cart_for", e))
    }

    pub async fn cart(&self, id: CartId) -> StoreResult<Cart> {
        sqlx::query("SELECT id, owner_id, is_active, shopping_date FROM carts WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("cart", e))?
            .ok_or_else(|| StoreError::not_found("cart", id))
            .and_then(|row| decode_cart(&row).map_err(|e| map_sqlx_error("cart", e)))
    }

    pub async fn cart_lines(&self, cart_id: CartId) -> StoreResult<Vec<CartLine>> {
        let sql =
            format!("SELECT {CART_LINE_COLUMNS} FROM cart_lines WHERE cart_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(cart_id.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("cart_lines", e))?;
        rows.iter()
            .map(|row| decode_cart_line(row).map_err(|e| map_sqlx_error("cart_lines", e)))
            .collect()
    }

    /// Lines go with the cart; orders keep their row with `cart_id` nulled.
    pub async fn delete_cart(&self, id: CartId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_cart", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("cart", id));
        }
        Ok(())
    }

    /// Turn an active, non-empty cart into an order and close the cart.
    #[instrument(skip(self, contact, at), fields(cart_id = %cart_id), err)]
    pub async fn checkout(
        &self,
        cart_id: CartId,
        contact: OrderContact,
        at: DateTime<Utc>,
    ) -> StoreResult<Order> {
        let mut tx = self.begin("checkout").await?;

        let mut cart = sqlx::query(
            "SELECT id, owner_id, is_active, shopping_date FROM carts WHERE id = $1 FOR UPDATE",
        )
        .bind(cart_id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("checkout", e))?
        .ok_or_else(|| StoreError::not_found("cart", cart_id))
        .and_then(|row| decode_cart(&row).map_err(|e| map_sqlx_error("checkout", e)))?;

        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_lines WHERE cart_id = $1")
            .bind(cart_id.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("checkout", e))?;
        if lines == 0 {
            return Err(DomainError::validation(format!("cart {cart_id} is empty")).into());
        }

        let order_id = OrderId::new(next_id(&mut *tx, "orders").await?);
        let order = Order::place(order_id, &cart, contact)?;
        cart.check_out(at)?;

        sqlx::query(
            "INSERT INTO orders (id, cart_id, full_name, email, phone, address, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order_id.get())
        .bind(cart_id.get())
        .bind(&order.contact().full_name)
        .bind(order.contact().email.as_deref())
        .bind(&order.contact().phone)
        .bind(&order.contact().address)
        .bind(order.status().code())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("checkout", e))?;

        sqlx::query("UPDATE carts SET is_active = FALSE, shopping_date = $2 WHERE id = $1")
            .bind(cart_id.get())
            .bind(cart.shopping_date())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("checkout", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("checkout", e))?;
        info!(order_id = %order_id, "order placed");
        Ok(order)
    }

    pub async fn order(&self, id: OrderId) -> StoreResult<Order> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("order", e))?
            .ok_or_else(|| StoreError::not_found("order", id))?;
        decode_order(&row)
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn advance_order(&self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        let mut tx = self.begin("advance_order").await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("advance_order", e))?
            .ok_or_else(|| StoreError::not_found("order", id))?;
        let mut order = decode_order(&row)?;
        order.advance_to(status)?;

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.get())
            .bind(order.status().code())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("advance_order", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("advance_order", e))?;
        info!(status = %order.status(), "order status advanced");
        Ok(order)
    }

    // --- wishlist & users --------------------------------------------------

    /// Idempotent: liking an already liked product returns the existing entry.
    pub async fn add_to_wishlist(
        &self,
        user: UserId,
        product_id: ProductId,
    ) -> StoreResult<WishlistEntry> {
        let inserted: Option<i64> = sqlx::query_scalar(
            "INSERT INTO wishlist_entries (user_id, product_id) \
             SELECT $1, id FROM products WHERE id = $2 \
             ON CONFLICT (user_id, product_id) DO NOTHING RETURNING id",
        )
        .bind(user.as_uuid())
        .bind(product_id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_to_wishlist", e))?;

        let id = match inserted {
            Some(id) => id,
            None => sqlx::query_scalar(
                "SELECT id FROM wishlist_entries WHERE user_id = $1 AND product_id = $2",
            )
            .bind(user.as_uuid())
            .bind(product_id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("add_to_wishlist", e))?
            // Neither inserted nor present: the product does not exist.
            .ok_or_else(|| StoreError::not_found("product", product_id))?,
        };
        Ok(WishlistEntry {
            id: WishlistEntryId::new(id),
            user_id: user,
            product_id,
        })
    }

    /// Returns whether an entry was removed.
    pub async fn remove_from_wishlist(
        &self,
        user: UserId,
        product_id: ProductId,
    ) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM wishlist_entries WHERE user_id = $1 AND product_id = $2")
                .bind(user.as_uuid())
                .bind(product_id.get())
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("remove_from_wishlist", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn wishlist(&self, user: UserId) -> StoreResult<Vec<WishlistEntry>> {
        let rows = sqlx::query(
            "SELECT id, user_id, product_id FROM wishlist_entries WHERE user_id = $1 ORDER BY id",
        )
        .bind(user.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("wishlist", e))?;
        rows.iter()
            .map(|row| decode_wishlist_entry(row).map_err(|e| map_sqlx_error("wishlist", e)))
            .collect()
    }

    pub async fn is_liked(&self, user: UserId, product_id: ProductId) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM wishlist_entries WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user.as_uuid())
        .bind(product_id.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("is_liked", e))
    }

    /// The identity provider deleted a user: carts become ownerless, the
    /// wishlist goes away.
    #[instrument(skip(self), fields(user_id = %user), err)]
    pub async fn delete_user(&self, user: UserId) -> StoreResult<()> {
        let mut tx = self.begin("delete_user").await?;
        sqlx::query("UPDATE carts SET owner_id = NULL WHERE owner_id = $1")
            .bind(user.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        sqlx::query("DELETE FROM wishlist_entries WHERE user_id = $1")
            .bind(user.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        info!("user data detached");
        Ok(())
    }
}

/// Find or open the cart an add-to-cart lands in.
///
/// A user's active cart is unique (`carts_owner_active_key`). When two
/// requests race to open it, the loser's insert is skipped by
/// `ON CONFLICT DO NOTHING` after the winner commits, and it locks the
/// winner's row instead.
async fn resolve_cart(
    tx: &mut Transaction<'static, Postgres>,
    owner: CartOwner,
) -> StoreResult<CartId> {
    match owner {
        CartOwner::User(user) => {
            if let Some(id) = lock_active_cart(tx, user).await? {
                return Ok(id);
            }
            let opened: Option<i64> = sqlx::query_scalar(
                "INSERT INTO carts (owner_id, is_active) VALUES ($1, TRUE) \
                 ON CONFLICT (owner_id) WHERE is_active AND owner_id IS NOT NULL DO NOTHING \
                 RETURNING id",
            )
            .bind(user.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("resolve_cart", e))?;
            match opened {
                Some(id) => Ok(CartId::new(id)),
                None => lock_active_cart(tx, user).await?.ok_or_else(|| {
                    StoreError::backend("resolve_cart", "active cart vanished during open")
                }),
            }
        }
        CartOwner::Anonymous(None) => {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO carts (owner_id, is_active) VALUES (NULL, TRUE) RETURNING id",
            )
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("resolve_cart", e))?;
            Ok(CartId::new(id))
        }
        CartOwner::Anonymous(Some(id)) => {
            let cart = sqlx::query(
                "SELECT id, owner_id, is_active, shopping_date FROM carts WHERE id = $1 FOR UPDATE",
            )
            .bind(id.get())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("resolve_cart", e))?
            .ok_or_else(|| StoreError::not_found("cart", id))
            .and_then(|row| decode_cart(&row).map_err(|e| map_sqlx_error("resolve_cart", e)))?;
            cart.ensure_active()?;
            Ok(id)
        }
    }
}

async fn lock_active_cart(
    tx: &mut Transaction<'static, Postgres>,
    user: UserId,
) -> StoreResult<Option<CartId>> {
    let id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM carts WHERE owner_id = $1 AND is_active FOR UPDATE")
            .bind(user.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("resolve_cart", e))?;
    Ok(id.map(CartId::new))
}

/// Reserve the next id of a `BIGSERIAL` table so the domain constructor can
/// run before the insert.
async fn next_id<'e, E>(executor: E, table: &'static str) -> StoreResult<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence($1, 'id'))")
        .bind(table)
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error("next_id", e))
}

// --- row mapping -------------------------------------------------------------

#[derive(Debug)]
struct ProductRow {
    id: i64,
    category_id: i64,
    name: String,
    quantity: i64,
    price_minor: i64,
    description: String,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            category_id: row.try_get("category_id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            price_minor: row.try_get("price_minor")?,
            description: row.try_get("description")?,
        })
    }
}

impl ProductRow {
    fn into_product(self) -> StoreResult<Product> {
        let price = money_from_column(self.price_minor)
            .map_err(|e| map_sqlx_error("product", e))?;
        Ok(Product::from_parts(
            ProductId::new(self.id),
            CategoryId::new(self.category_id),
            self.name,
            self.quantity,
            price,
            self.description,
        ))
    }
}

#[derive(Debug)]
struct StockEntryRow {
    id: i64,
    product_id: i64,
    quantity: i64,
    prior_quantity: i64,
    notes: String,
    recorded_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for StockEntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockEntryRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            prior_quantity: row.try_get("prior_quantity")?,
            notes: row.try_get("notes")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl StockEntryRow {
    fn into_entry(self) -> StockEntry {
        StockEntry {
            id: StockEntryId::new(self.id),
            product_id: ProductId::new(self.product_id),
            quantity: self.quantity,
            prior_quantity: self.prior_quantity,
            notes: self.notes,
            recorded_at: self.recorded_at,
        }
    }
}

fn decode_category(row: &PgRow) -> StoreResult<Category> {
    let decode = |row: &PgRow| -> Result<(i64, NewCategory), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            NewCategory {
                name: row.try_get("name")?,
                title: row.try_get("title")?,
                image: row.try_get("image")?,
            },
        ))
    };
    let (id, new) = decode(row).map_err(|e| map_sqlx_error("categories", e))?;
    Ok(Category::create(CategoryId::new(id), new)?)
}

fn decode_product_image(row: &PgRow) -> StoreResult<ProductImage> {
    let decode = |row: &PgRow| -> Result<(i64, NewProductImage), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            NewProductImage {
                product_id: ProductId::new(row.try_get("product_id")?),
                image: row.try_get("image")?,
            },
        ))
    };
    let (id, new) = decode(row).map_err(|e| map_sqlx_error("product_images", e))?;
    Ok(ProductImage::create(ProductImageId::new(id), new)?)
}

fn decode_banner(row: &PgRow) -> StoreResult<Banner> {
    let decode = |row: &PgRow| -> Result<(i64, NewBanner), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            NewBanner {
                title: row.try_get("title")?,
                subtitle: row.try_get("subtitle")?,
                image: row.try_get("image")?,
                is_active: row.try_get("is_active")?,
            },
        ))
    };
    let (id, new) = decode(row).map_err(|e| map_sqlx_error("banners", e))?;
    Ok(Banner::create(BannerId::new(id), new)?)
}

fn decode_contact(row: &PgRow) -> Result<Contact, sqlx::Error> {
    Ok(Contact {
        id: ContactId::new(row.try_get("id")?),
        whatsapp: row.try_get("whatsapp")?,
        twitter: row.try_get("twitter")?,
        facebook: row.try_get("facebook")?,
        telegram: row.try_get("telegram")?,
        phone: row.try_get("phone")?,
    })
}

fn decode_cart(row: &PgRow) -> Result<Cart, sqlx::Error> {
    let owner: Option<Uuid> = row.try_get("owner_id")?;
    Ok(Cart::from_parts(
        CartId::new(row.try_get("id")?),
        owner.map(UserId::from_uuid),
        row.try_get("is_active")?,
        row.try_get("shopping_date")?,
    ))
}

fn decode_cart_line(row: &PgRow) -> Result<CartLine, sqlx::Error> {
    let image_id: Option<i64> = row.try_get("image_id")?;
    let product_id: Option<i64> = row.try_get("product_id")?;
    let quantity: i32 = row.try_get("quantity")?;
    let total: Option<i64> = row.try_get("total_minor")?;
    Ok(CartLine::from_parts(
        CartLineId::new(row.try_get("id")?),
        CartId::new(row.try_get("cart_id")?),
        image_id.map(ProductImageId::new),
        product_id.map(ProductId::new),
        u32::try_from(quantity).map_err(|e| sqlx::Error::ColumnDecode {
            index: "quantity".to_string(),
            source: Box::new(e),
        })?,
        total.map(money_from_column).transpose()?,
    ))
}

fn decode_order(row: &PgRow) -> StoreResult<Order> {
    let decode = |row: &PgRow| -> Result<(i64, Option<i64>, OrderContact, i16), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            row.try_get("cart_id")?,
            OrderContact {
                full_name: row.try_get("full_name")?,
                email: row.try_get("email")?,
                phone: row.try_get("phone")?,
                address: row.try_get("address")?,
            },
            row.try_get("status")?,
        ))
    };
    let (id, cart_id, contact, status) = decode(row).map_err(|e| map_sqlx_error("orders", e))?;
    Ok(Order::from_parts(
        OrderId::new(id),
        cart_id.map(CartId::new),
        contact,
        OrderStatus::from_code(status)?,
    ))
}

fn decode_wishlist_entry(row: &PgRow) -> Result<WishlistEntry, sqlx::Error> {
    let user: Uuid = row.try_get("user_id")?;
    Ok(WishlistEntry {
        id: WishlistEntryId::new(row.try_get("id")?),
        user_id: UserId::from_uuid(user),
        product_id: ProductId::new(row.try_get("product_id")?),
    })
}

fn money_from_column(minor: i64) -> Result<Money, sqlx::Error> {
    u64::try_from(minor)
        .map(Money::from_minor)
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "price_minor".to_string(),
            source: Box::new(e),
        })
}

fn money_column(money: Money) -> StoreResult<i64> {
    i64::try_from(money.minor())
        .map_err(|_| DomainError::invariant(format!("amount {money} does not fit a BIGINT")).into())
}

fn quantity_column(quantity: u32) -> StoreResult<i32> {
    i32::try_from(quantity)
        .map_err(|_| DomainError::validation(format!("quantity {quantity} is too large")).into())
}

fn count_column(count: i64) -> usize {
    usize::try_from(count).unwrap_or(0)
}
