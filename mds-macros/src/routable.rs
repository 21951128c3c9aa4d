//! `#[routable]` - marker declarations on traits and impl blocks.
//!
//! - `#[routable(key = "k")]` on the item marks every method of the type
//! - `#[mds]` / `#[mds(key = "k")]` on a method marks that method
//! - `impl Trait for Type` records `Type` as an implementor of `Trait`
//!
//! Owners are full paths: `std::any::type_name` for impl self types and the
//! defining module path for traits, so same-named items never collide.
//!
//! A routable trait gains two hidden provided functions, its name and its
//! supertrait edges. Trait impls reach them through `<Type as Trait>`, which
//! makes the compiler resolve the trait path instead of the macro. Supertraits
//! and implemented traits must therefore be `#[routable]` too, unless
//! `#[routable(inherit = false)]` opts out of inheritance.
//!
//! Everything is submitted to `::mds::inventory` and picked up by
//! `MarkerIndex::from_inventory`.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    Attribute, Ident, Item, ItemImpl, ItemTrait, LitBool, LitStr, Meta, Path, Token,
    TraitBoundModifier, TypeParamBound,
    parse::{Parse, ParseStream},
    parse_quote,
};

const HELPER: &str = "mds";

/// Supertraits that never carry markers.
const STD_TRAITS: &[&str] = &[
    "Send",
    "Sync",
    "Sized",
    "Unpin",
    "Copy",
    "Clone",
    "Debug",
    "Display",
    "Default",
    "Eq",
    "PartialEq",
    "Ord",
    "PartialOrd",
    "Hash",
    "Any",
    "Fn",
    "FnMut",
    "FnOnce",
    "UnwindSafe",
    "RefUnwindSafe",
];

/// Arguments of `#[routable(...)]` and of the `#[mds(...)]` helper.
#[derive(Default)]
pub(crate) struct KeyArgs {
    /// Declared key; `None` when the argument list is empty.
    pub key: Option<LitStr>,
    /// `inherit = false` skips ancestry declarations.
    pub inherit: Option<LitBool>,
}

impl KeyArgs {
    fn inherits(&self) -> bool {
        self.inherit.as_ref().is_none_or(LitBool::value)
    }
}

impl Parse for KeyArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut key = None;
        let mut inherit = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "key" => {
                    let lit: LitStr = input.parse()?;
                    key = Some(lit);
                }
                "inherit" => {
                    let lit: LitBool = input.parse()?;
                    inherit = Some(lit);
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", other),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(KeyArgs { key, inherit })
    }
}

struct MarkedMethod {
    name: String,
    key: String,
}

/// How generated code names the owner of the declarations.
enum Owner {
    /// A `&'static str` expression.
    Literal(TokenStream),
    /// A `fn() -> &'static str` path.
    Computed(TokenStream),
}

pub(crate) fn expand(args: KeyArgs, item: Item) -> syn::Result<TokenStream> {
    match item {
        Item::Trait(item) => expand_trait(args, item),
        Item::Impl(item) => expand_impl(args, item),
        other => Err(syn::Error::new_spanned(
            other,
            "#[routable] expects a trait or an impl block",
        )),
    }
}

fn name_fn() -> Ident {
    format_ident!("__mds_routable_name")
}

fn ancestry_fn() -> Ident {
    format_ident!("__mds_routable_ancestry")
}

fn expand_trait(args: KeyArgs, mut item: ItemTrait) -> syn::Result<TokenStream> {
    let name = LitStr::new(&item.ident.to_string(), item.ident.span());
    let qualified = quote! {
        ::core::concat!(::core::module_path!(), "::", #name)
    };

    let parents: Vec<&Path> = if args.inherits() {
        item.supertraits
            .iter()
            .filter_map(|bound| match bound {
                TypeParamBound::Trait(bound)
                    if !matches!(bound.modifier, TraitBoundModifier::Maybe(_))
                        && !is_std_trait(&bound.path) =>
                {
                    Some(&bound.path)
                }
                _ => None,
            })
            .collect()
    } else {
        Vec::new()
    };

    let name_fn = name_fn();
    let ancestry_fn = ancestry_fn();
    let edges = parents.iter().map(|parent| {
        quote! {
            edges.push((#qualified, <Self as #parent>::#name_fn()));
            <Self as #parent>::#ancestry_fn(edges);
        }
    });
    let hidden: [syn::TraitItem; 2] = [
        parse_quote! {
            #[doc(hidden)]
            #[allow(dead_code)]
            fn #name_fn() -> &'static str
            where
                Self: Sized,
            {
                #qualified
            }
        },
        parse_quote! {
            #[doc(hidden)]
            #[allow(dead_code, unused_variables)]
            fn #ancestry_fn(edges: &mut ::std::vec::Vec<(&'static str, &'static str)>)
            where
                Self: Sized,
            {
                #(#edges)*
            }
        },
    ];

    let mut marked = Vec::new();
    for trait_item in &mut item.items {
        if let syn::TraitItem::Fn(method) = trait_item {
            if let Some(key) = take_marker(&mut method.attrs)? {
                marked.push(MarkedMethod {
                    name: method.sig.ident.to_string(),
                    key,
                });
            }
        }
    }
    item.items.extend(hidden);

    let declarations = declarations(&Owner::Literal(qualified), args.key, &marked);
    Ok(quote! {
        #item
        #declarations
    })
}

fn expand_impl(args: KeyArgs, mut item: ItemImpl) -> syn::Result<TokenStream> {
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "#[routable] does not support generic impl blocks",
        ));
    }
    if !matches!(&*item.self_ty, syn::Type::Path(_)) {
        return Err(syn::Error::new_spanned(
            &item.self_ty,
            "#[routable] expects a named self type",
        ));
    }

    let self_ty = &item.self_ty;
    let type_name = quote! { ::std::any::type_name::<#self_ty> };

    let ancestry = item
        .trait_
        .as_ref()
        .filter(|_| args.inherits())
        .map(|(_, path, _)| {
            let name_fn = name_fn();
            let ancestry_fn = ancestry_fn();
            quote! {
                ::mds::inventory::submit! {
                    ::mds::AncestryDecl::implements(
                        #type_name,
                        <#self_ty as #path>::#name_fn,
                        <#self_ty as #path>::#ancestry_fn,
                    )
                }
            }
        });

    let owner = Owner::Computed(type_name.clone());

    let mut marked = Vec::new();
    for impl_item in &mut item.items {
        if let syn::ImplItem::Fn(method) = impl_item {
            if let Some(key) = take_marker(&mut method.attrs)? {
                marked.push(MarkedMethod {
                    name: method.sig.ident.to_string(),
                    key,
                });
            }
        }
    }

    let declarations = declarations(&owner, args.key, &marked);
    Ok(quote! {
        #item
        #ancestry
        #declarations
    })
}

fn is_std_trait(path: &Path) -> bool {
    path.segments
        .last()
        .is_some_and(|segment| STD_TRAITS.contains(&segment.ident.to_string().as_str()))
}

/// Remove every `#[mds]` helper from `attrs`, returning the declared key
/// (empty when none was given). The last helper wins.
fn take_marker(attrs: &mut Vec<Attribute>) -> syn::Result<Option<String>> {
    let mut key = None;
    let mut error = None;

    attrs.retain(|attr| {
        if !attr.path().is_ident(HELPER) {
            return true;
        }
        match &attr.meta {
            Meta::Path(_) => key = Some(String::new()),
            Meta::List(_) => match attr.parse_args::<KeyArgs>() {
                Ok(KeyArgs {
                    inherit: Some(lit), ..
                }) => {
                    error = Some(syn::Error::new_spanned(
                        lit,
                        "`inherit` is only valid on #[routable]",
                    ));
                }
                Ok(args) => key = Some(args.key.map(|lit| lit.value()).unwrap_or_default()),
                Err(e) => error = Some(e),
            },
            Meta::NameValue(meta) => {
                error = Some(syn::Error::new_spanned(
                    meta,
                    "expected #[mds] or #[mds(key = \"...\")]",
                ));
            }
        }
        false
    });

    match error {
        Some(e) => Err(e),
        None => Ok(key),
    }
}

fn declarations(owner: &Owner, key: Option<LitStr>, marked: &[MarkedMethod]) -> TokenStream {
    let type_level = key.map(|key| {
        let decl = match owner {
            Owner::Literal(owner) => quote! { ::mds::MarkerDecl::type_level(#owner, #key) },
            Owner::Computed(owner) => quote! { ::mds::MarkerDecl::type_level_of(#owner, #key) },
        };
        quote! {
            ::mds::inventory::submit! { #decl }
        }
    });

    let methods = marked.iter().map(|method| {
        let name = LitStr::new(&method.name, Span::call_site());
        let key = &method.key;
        let decl = match owner {
            Owner::Literal(owner) => quote! { ::mds::MarkerDecl::method(#owner, #name, #key) },
            Owner::Computed(owner) => quote! { ::mds::MarkerDecl::method_of(#owner, #name, #key) },
        };
        quote! {
            ::mds::inventory::submit! { #decl }
        }
    });

    quote! {
        #type_level
        #(#methods)*
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_err(args: KeyArgs, item: Item) -> String {
        match expand(args, item) {
            Ok(tokens) => panic!("expected an error, got {tokens}"),
            Err(e) => e.to_string(),
        }
    }

    fn has_helper(attrs: &[Attribute]) -> bool {
        attrs.iter().any(|attr| attr.path().is_ident(HELPER))
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let err = syn::parse_str::<KeyArgs>(r#"value = "replica""#)
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "unknown attribute: value");
    }

    #[test]
    fn test_arguments_parse() {
        let args = syn::parse_str::<KeyArgs>(r#"key = "replica", inherit = false"#).unwrap();
        assert_eq!(args.key.unwrap().value(), "replica");
        assert!(!args.inherit.unwrap().value());
        assert!(KeyArgs::default().inherits());
    }

    #[test]
    fn test_name_value_helper_rejected() {
        let mut method: syn::ImplItemFn = parse_quote! {
            #[mds = "replica"]
            fn find(&self) {}
        };
        let err = take_marker(&mut method.attrs).err().unwrap();
        assert_eq!(err.to_string(), "expected #[mds] or #[mds(key = \"...\")]");
    }

    #[test]
    fn test_inherit_on_helper_rejected() {
        let mut method: syn::ImplItemFn = parse_quote! {
            #[mds(inherit = false)]
            fn find(&self) {}
        };
        let err = take_marker(&mut method.attrs).err().unwrap();
        assert_eq!(err.to_string(), "`inherit` is only valid on #[routable]");
    }

    #[test]
    fn test_last_helper_wins() {
        let mut method: syn::ImplItemFn = parse_quote! {
            #[inline]
            #[mds(key = "replica")]
            #[mds]
            fn find(&self) {}
        };
        assert_eq!(take_marker(&mut method.attrs).unwrap(), Some(String::new()));
        assert_eq!(method.attrs.len(), 1);
    }

    #[test]
    fn test_non_trait_item_rejected() {
        let err = expand_err(KeyArgs::default(), parse_quote! { struct PgUserRepo; });
        assert_eq!(err, "#[routable] expects a trait or an impl block");
    }

    #[test]
    fn test_generic_impl_rejected() {
        let err = expand_err(
            KeyArgs::default(),
            parse_quote! {
                impl<T> UserRepo for Cached<T> {}
            },
        );
        assert_eq!(err, "#[routable] does not support generic impl blocks");
    }

    #[test]
    fn test_unnamed_self_type_rejected() {
        let err = expand_err(
            KeyArgs::default(),
            parse_quote! {
                impl UserRepo for &'static str {}
            },
        );
        assert_eq!(err, "#[routable] expects a named self type");
    }

    #[test]
    fn test_helpers_stripped_from_impl() {
        let tokens = expand(
            KeyArgs::default(),
            parse_quote! {
                impl UserRepo for PgUserRepo {
                    #[mds(key = "replica")]
                    fn find(&self) {}
                    #[mds]
                    fn save(&self) {}
                }
            },
        )
        .unwrap();

        let file: syn::File = syn::parse2(tokens).unwrap();
        let Some(Item::Impl(item)) = file.items.first() else {
            panic!("impl block not emitted first");
        };
        for impl_item in &item.items {
            if let syn::ImplItem::Fn(method) = impl_item {
                assert!(!has_helper(&method.attrs));
            }
        }
        // ancestry plus two method markers
        assert_eq!(file.items.len(), 4);
    }

    #[test]
    fn test_trait_gains_hidden_functions() {
        let tokens = expand(
            KeyArgs::default(),
            parse_quote! {
                trait UserRepo: Base + Send + ?Sized + std::fmt::Debug {
                    #[mds(key = "replica")]
                    fn find(&self);
                }
            },
        )
        .unwrap();

        let file: syn::File = syn::parse2(tokens).unwrap();
        let Some(Item::Trait(item)) = file.items.first() else {
            panic!("trait not emitted first");
        };
        let names: Vec<String> = item
            .items
            .iter()
            .filter_map(|item| match item {
                syn::TraitItem::Fn(method) => Some(method.sig.ident.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            ["find", "__mds_routable_name", "__mds_routable_ancestry"]
        );

        // only `Base` contributes an edge
        let text = quote!(#item).to_string();
        assert!(text.contains("< Self as Base >"));
        assert!(!text.contains("< Self as Send >"));
        assert!(!text.contains("Debug >"));
    }

    #[test]
    fn test_inherit_false_skips_ancestry() {
        let args = syn::parse_str::<KeyArgs>("inherit = false").unwrap();
        let tokens = expand(
            args,
            parse_quote! {
                impl Iterator for Numbers {
                    type Item = u32;
                    #[mds]
                    fn next(&mut self) -> Option<u32> { None }
                }
            },
        )
        .unwrap();

        let text = tokens.to_string();
        assert!(!text.contains("AncestryDecl"));
        assert!(text.contains("method_of"));
    }
}
