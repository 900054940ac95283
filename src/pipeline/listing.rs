//! Listing page extraction: product cards to [`ListingItem`]s.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::text::element_text;
use crate::config::ConfigError;
use crate::models::ListingItem;
use crate::selectors::{Field, SelectorRegistry};

/// Attributes that carry the product identifier on a card.
const GOODS_ID_ATTRS: &[&str] = &["data-ref-goodsno", "data-goodsno", "data-goods-no"];

/// Image attributes in priority order: lazy-load first, eager `src` last.
const IMAGE_ATTRS: &[&str] = &["data-original", "data-src", "src"];

/// Per-page inputs that are not part of the DOM.
#[derive(Debug, Clone, Copy)]
pub struct ListingContext<'a> {
    /// URL of the page being extracted, used to resolve relative links.
    pub page_url: &'a Url,
    pub category_id: Option<&'a str>,
    /// Detail URL template with `{goods_no}` and `{category_id}` placeholders.
    pub detail_url_template: Option<&'a str>,
}

/// Extracts product cards using the compiled selector chains.
#[derive(Debug)]
pub struct ListingExtractor {
    card: Vec<Selector>,
    name: Vec<Selector>,
    brand: Vec<Selector>,
    price: Vec<Selector>,
    link: Vec<Selector>,
    image: Vec<Selector>,
    tag: Selector,
}

impl ListingExtractor {
    pub fn new(registry: &SelectorRegistry) -> Result<Self, ConfigError> {
        let compile = |field: Field| registry.resolve_field(field).compile(field);
        let tag_group = registry.resolve_field(Field::Tag).joined();
        let tag = Selector::parse(&tag_group).map_err(|e| ConfigError::InvalidSelector {
            field: Field::Tag.key(),
            selector: tag_group.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            card: compile(Field::Card)?,
            name: compile(Field::Name)?,
            brand: compile(Field::Brand)?,
            price: compile(Field::Price)?,
            link: compile(Field::Link)?,
            image: compile(Field::Image)?,
            tag,
        })
    }

    /// Pull every named product card out of a rendered listing page.
    pub fn extract(&self, html: &str, ctx: &ListingContext<'_>) -> Vec<ListingItem> {
        let document = Html::parse_document(html);

        let cards: Vec<ElementRef<'_>> = self
            .card
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let total = cards.len();
        let items: Vec<ListingItem> = cards
            .into_iter()
            .filter_map(|card| self.extract_card(card, ctx))
            .collect();

        if items.len() < total {
            debug!(
                "Skipped {} of {} cards without a name on {}",
                total - items.len(),
                total,
                ctx.page_url
            );
        }
        items
    }

    fn extract_card(&self, card: ElementRef<'_>, ctx: &ListingContext<'_>) -> Option<ListingItem> {
        let scope = enclosing_list_item(card);

        let name = first_match(&self.name, scope, non_empty_text)?;
        let brand = first_match(&self.brand, scope, non_empty_text);
        let price_text = first_match(&self.price, scope, non_empty_text);

        let link = first_match(&self.link, scope, |el| {
            let href = el
                .value()
                .attr("href")
                .filter(|h| is_navigable(h))
                .or_else(|| el.value().attr("data-href").filter(|h| is_navigable(h)))?;
            resolve(ctx.page_url, href)
        })
        .or_else(|| synthesize_link(card, scope, ctx));

        let image_url = first_match(&self.image, scope, |el| {
            let src = IMAGE_ATTRS.iter().find_map(|attr| {
                el.value()
                    .attr(attr)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })?;
            resolve(ctx.page_url, src)
        });

        let tags = scope
            .select(&self.tag)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();

        Some(ListingItem {
            name,
            brand,
            price_text,
            link,
            image_url,
            tags,
        })
    }
}

/// Try each selector in order; the first element yielding a value wins.
fn first_match<'a, T>(
    chain: &[Selector],
    scope: ElementRef<'a>,
    extract: impl Fn(ElementRef<'a>) -> Option<T>,
) -> Option<T> {
    chain
        .iter()
        .find_map(|sel| scope.select(sel).find_map(&extract))
}

fn non_empty_text(el: ElementRef<'_>) -> Option<String> {
    Some(element_text(el)).filter(|t| !t.is_empty())
}

/// The card's nearest `<li>` (itself included), or the card when there is none.
fn enclosing_list_item(card: ElementRef<'_>) -> ElementRef<'_> {
    if card.value().name() == "li" {
        return card;
    }
    card.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "li")
        .unwrap_or(card)
}

fn is_navigable(href: &str) -> bool {
    let href = href.trim();
    !href.is_empty() && href != "#" && !href.to_ascii_lowercase().starts_with("javascript:")
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

/// Build a detail URL from the card's goods identifier and the configured template.
fn synthesize_link(
    card: ElementRef<'_>,
    scope: ElementRef<'_>,
    ctx: &ListingContext<'_>,
) -> Option<String> {
    let template = ctx.detail_url_template?;
    let goods_no = goods_id(card).or_else(|| {
        scope
            .descendants()
            .filter_map(ElementRef::wrap)
            .find_map(goods_id)
    })?;
    let url = template
        .replace("{goods_no}", &goods_no)
        .replace("{category_id}", ctx.category_id.unwrap_or_default());
    resolve(ctx.page_url, &url)
}

fn goods_id(el: ElementRef<'_>) -> Option<String> {
    GOODS_ID_ATTRS.iter().find_map(|attr| {
        el.value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}
