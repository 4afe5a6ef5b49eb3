//! `#[shared_db_test]`: async database tests on the shared test runtime.
//!
//! ```ignore
//! #[shared_db_test]
//! async fn reserves_nonce(db: &'static TestDb) {
//!     let repo = PgEdgeRepo::new(db.pool().clone());
//!     // ...
//! }
//! ```
//!
//! Expands to a plain `#[test]` that runs the body through
//! `crate::common::test_db::run_test`. A single argument, if present, is bound
//! to `crate::common::test_db::get_test_db().await`.
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn};

#[proc_macro_attribute]
pub fn shared_db_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    parse_macro_input!(attr as syn::parse::Nothing);
    let input_fn = parse_macro_input!(item as ItemFn);

    match expand(input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input_fn: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let sig = &input_fn.sig;
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(
            sig.fn_token.span(),
            "shared_db_test requires an async fn",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "shared_db_test does not support generic parameters",
        ));
    }

    let db_binding = match sig.inputs.len() {
        0 => None,
        1 => match sig.inputs.first() {
            Some(FnArg::Typed(arg)) => {
                let pat = &arg.pat;
                let ty = &arg.ty;
                Some(quote! {
                    let #pat: #ty = crate::common::test_db::get_test_db().await;
                })
            }
            _ => {
                return Err(syn::Error::new(
                    sig.inputs.span(),
                    "shared_db_test cannot be applied to methods",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                sig.inputs.span(),
                "shared_db_test accepts at most one argument (the test database)",
            ))
        }
    };

    let attrs = &input_fn.attrs;
    let vis = &input_fn.vis;
    let name = &sig.ident;
    let output = &sig.output;
    let block = &input_fn.block;

    Ok(quote! {
        #(#attrs)*
        #[test]
        #vis fn #name() #output {
            crate::common::test_db::run_test(async {
                #db_binding
                #block
            })
        }
    })
}
