//! Procedural macros for mds.

use proc_macro::TokenStream;
use syn::{Item, parse_macro_input};

mod routable;

/// Declare routing markers on a trait or impl block.
///
/// ```rust,ignore
/// #[mds::routable]
/// trait UserRepo {
///     #[mds(key = "replica")]
///     fn find(&self, id: u64) -> Option<User>;
///
///     #[mds]
///     fn save(&self, user: &User);
/// }
///
/// #[mds::routable]
/// impl UserRepo for PgUserRepo {
///     // `find` and `save` inherit the markers declared on the trait.
/// }
///
/// #[mds::routable(key = "analytics")]
/// impl ReportRepo {
///     // every method is routed to "analytics"
/// }
/// ```
///
/// The `#[mds]` helper is removed from the output. Declarations are collected
/// at link time; build the lookup with `MarkerIndex::from_inventory()`.
///
/// Types are named by `std::any::type_name`, so build call sites with
/// `CallSite::of::<PgUserRepo>("find")`. Implemented traits and supertraits
/// must be `#[routable]` as well; `#[routable(inherit = false)]` records no
/// ancestry. Generic impl blocks are not supported.
#[proc_macro_attribute]
pub fn routable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as routable::KeyArgs);
    let item = parse_macro_input!(item as Item);

    match routable::expand(args, item) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => e.to_compile_error().into(),
    }
}
