//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Every mutation is one read-modify-write of the cart stored in the
//! visitor's session, followed by a fresh render of the cart fragment.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Response},
};
use cartkeeper_core::{Cart, CartItem, NewCartItem, Price, ProductId, QuantityAction};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::state::AppState;
use crate::storage::CartStore;

/// Event name sent in `HX-Trigger` after any cart mutation.
pub const CART_UPDATED_EVENT: &str = "cart-updated";

/// Cart item display data for templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    pub id: String,
    pub name: String,
    pub image: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    /// Whether the decrease control is active (quantity above one).
    pub can_decrease: bool,
}

/// Cart display data for templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Price::new(Decimal::ZERO).display(),
            item_count: 0,
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            subtotal: Price::new(cart.subtotal()).display(),
            item_count: cart.item_count(),
        }
    }
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name.clone(),
            image: item.image.clone(),
            quantity: item.quantity.get(),
            price: item.unit_price().display(),
            line_price: Price::new(item.line_total()).display(),
            can_decrease: item.quantity.get() > 1,
        }
    }
}

/// Add to cart form data.
///
/// The price arrives as text and is parsed by the handler so a malformed
/// value is a 400 like every other invalid add.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub image: String,
}

/// Quantity step form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub id: String,
    pub action: QuantityAction,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub id: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
    pub store_name: String,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Add-to-cart confirmation fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_added.html")]
pub struct CartAddedTemplate {
    pub name: String,
    pub count: u32,
}

impl CartItemsTemplate {
    fn from_cart(cart: &Cart) -> Self {
        Self {
            cart: CartView::from(cart),
        }
    }
}

fn parse_product_id(raw: &str) -> Result<ProductId> {
    ProductId::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn parse_price(raw: &str) -> Result<Decimal> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest("price must be a decimal number".to_string()))
}

/// Wrap a fragment with the trigger that refreshes the count badge.
fn cart_updated(fragment: impl IntoResponse) -> Response {
    (
        AppendHeaders([("HX-Trigger", CART_UPDATED_EVENT)]),
        fragment,
    )
        .into_response()
}

/// Display cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let cart = CartStore::new(session).load().await;

    CartShowTemplate {
        cart: CartView::from(&cart),
        store_name: state.config().store_name.clone(),
    }
}

/// Add one unit of a product to the cart (HTMX).
///
/// Called from product markup with the product's id, name, price and image.
/// Responds with a confirmation naming the product and the new total item
/// count.
#[instrument(skip(session, form), fields(product_id = %form.id))]
pub async fn add(session: Session, Form(form): Form<AddToCartForm>) -> Result<Response> {
    let id = parse_product_id(&form.id)?;
    let price = parse_price(&form.price)?;
    let item = NewCartItem::new(id, form.name, price, form.image)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let name = item.name().to_owned();

    let (_, count) = CartStore::new(session)
        .try_update(|cart| cart.add_item(item))
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    tracing::info!(item_count = count, "Added item to cart");
    add_breadcrumb("cart", "Added item to cart", &[("product_id", form.id.trim())]);

    Ok(cart_updated(CartAddedTemplate { name, count }))
}

/// Step an item's quantity up or down by one (HTMX).
///
/// Decreasing stops at one. Unknown products leave the cart unchanged.
/// An increase that would overflow the cart total is rejected.
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> Result<Response> {
    let id = parse_product_id(&form.id)?;

    let (cart, quantity) = CartStore::new(session)
        .try_update(|cart| cart.adjust_quantity(&id, form.action))
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if quantity.is_none() {
        tracing::debug!(product_id = %id, "Quantity update for product not in cart");
    }

    Ok(cart_updated(CartItemsTemplate::from_cart(&cart)))
}

/// Remove an item from the cart (HTMX).
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> Result<Response> {
    let id = parse_product_id(&form.id)?;

    let (cart, removed) = CartStore::new(session)
        .update(|cart| cart.remove_item(&id))
        .await;

    if removed {
        add_breadcrumb("cart", "Removed item from cart", &[("product_id", id.as_str())]);
    }

    Ok(cart_updated(CartItemsTemplate::from_cart(&cart)))
}

/// Empty the cart (HTMX).
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Response {
    CartStore::new(session).clear().await;

    cart_updated(CartItemsTemplate {
        cart: CartView::empty(),
    })
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    let cart = CartStore::new(session).load().await;

    CartCountTemplate {
        count: cart.item_count(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn id(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn sample_cart() -> Cart {
        let mut cart = Cart::new();
        let alpha = NewCartItem::new(id("a"), "Alpha", Decimal::new(10, 0), "/a.jpg").unwrap();
        cart.add_item(alpha).unwrap();
        let beta = NewCartItem::new(id("b"), "Beta", Decimal::new(5, 0), "/b.jpg").unwrap();
        cart.add_item(beta.clone()).unwrap();
        cart.add_item(beta).unwrap();
        cart
    }

    fn render_items(cart: &Cart) -> String {
        CartItemsTemplate::from_cart(cart).render().unwrap()
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::from(&sample_cart());

        assert_eq!(view.subtotal, "$20.00");
        assert_eq!(view.item_count, 3);
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[1].line_price, "$10.00");
        assert_eq!(view.items[1].price, "$5.00");
    }

    #[test]
    fn test_cart_view_decrease_flag() {
        let view = CartView::from(&sample_cart());
        assert!(!view.items[0].can_decrease);
        assert!(view.items[1].can_decrease);
    }

    #[test]
    fn test_empty_view_matches_empty_cart() {
        assert_eq!(CartView::empty(), CartView::from(&Cart::new()));
    }

    #[test]
    fn test_render_empty_cart() {
        let html = render_items(&Cart::new());

        assert!(html.contains("Your cart is empty."));
        assert!(html.contains("$0.00"));
        assert!(html.contains("Subtotal (0 items)"));
        assert!(!html.contains("cart-item"));
        assert!(!html.contains("quantity-btn"));
    }

    #[test]
    fn test_render_rows_carry_product_id() {
        let html = render_items(&sample_cart());

        assert!(!html.contains("Your cart is empty."));
        let rows = html.matches("border-b pb-4 cart-item\"").count();
        assert_eq!(rows, 2);
        assert!(html.contains("data-product-id=\"a\""));
        assert!(html.contains("data-product-id=\"b\""));
        assert!(html.contains("Subtotal (3 items)"));
        assert!(html.contains("$20.00"));
        assert_eq!(html.matches("name=\"id\" value=\"b\"").count(), 2);
    }

    #[test]
    fn test_render_preserves_insertion_order() {
        let html = render_items(&sample_cart());
        let a = html.find("data-product-id=\"a\"").unwrap();
        let b = html.find("data-product-id=\"b\"").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_render_escapes_item_fields() {
        let mut cart = Cart::new();
        let bold = NewCartItem::new(id("x\"y"), "<b>Bold</b>", Decimal::ONE, "/x.jpg").unwrap();
        cart.add_item(bold).unwrap();
        let html = render_items(&cart);

        assert!(!html.contains("<b>Bold</b>"));
        assert!(html.contains("&lt;b&gt;Bold&lt;/b&gt;"));
        assert!(!html.contains("data-product-id=\"x\"y\""));
    }

    #[test]
    fn test_render_is_idempotent() {
        let cart = sample_cart();
        assert_eq!(render_items(&cart), render_items(&cart));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price(" 19.99 ").unwrap(), Decimal::new(1999, 2));
        assert!(matches!(parse_price("ten"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_price(""), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_render_largest_cart() {
        let mut cart = Cart::new();
        let price = "50000000000000000000000000000".parse().unwrap();
        cart.add_item(NewCartItem::new(id("a"), "Big", price, "").unwrap()).unwrap();

        let view = CartView::from(&cart);
        assert_eq!(view.subtotal, "$50000000000000000000000000000.00");
        assert!(render_items(&cart).contains("Subtotal (1 items)"));
    }

    #[test]
    fn test_render_confirmation() {
        let html = CartAddedTemplate {
            name: "Alpha".to_string(),
            count: 3,
        }
        .render()
        .unwrap();
        assert!(html.contains("Alpha added to cart! (Total items: 3)"));
    }

    #[test]
    fn test_render_full_page_includes_list() {
        let html = CartShowTemplate {
            cart: CartView::from(&sample_cart()),
            store_name: "Test Store".to_string(),
        }
        .render()
        .unwrap();

        assert!(html.contains("<title>Shopping Cart - Test Store</title>"));
        assert!(html.contains("id=\"cart-list\""));
        assert!(html.contains("id=\"clear-cart\""));
        assert!(html.contains("Subtotal (3 items)"));
    }
}
