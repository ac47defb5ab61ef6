use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn, LitInt};

/// Replacement for `#[test]` that reports wall-clock time and fails the test
/// when it runs past a budget (default: 2000 ms).
///
/// # Usage
/// ```ignore
/// use test_macros::timed_test;
///
/// #[timed_test]
/// fn fast_test() {
///     assert!(true);
/// }
///
/// #[timed_test(30_000)]
/// fn slow_test() {
///     // 30-second budget
/// }
/// ```
#[proc_macro_attribute]
pub fn timed_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let budget_ms: u64 = if attr.is_empty() {
        2000
    } else {
        parse_macro_input!(attr as LitInt)
            .base10_parse::<u64>()
            .expect("timed_test expects an integer budget in milliseconds")
    };

    let func = parse_macro_input!(item as ItemFn);
    let name = &func.sig.ident;
    let body = &func.block;
    let attrs = &func.attrs;
    let vis = &func.vis;

    let expanded = quote! {
        #(#attrs)*
        #[test]
        #vis fn #name() {
            let __start = ::std::time::Instant::now();
            let __outcome = ::std::panic::catch_unwind(
                ::std::panic::AssertUnwindSafe(|| #body)
            );
            let __elapsed_ms = __start.elapsed().as_millis() as u64;

            eprintln!("[timed_test] {}: {}ms", stringify!(#name), __elapsed_ms);

            if let ::std::result::Result::Err(__payload) = __outcome {
                ::std::panic::resume_unwind(__payload);
            }

            assert!(
                __elapsed_ms < #budget_ms,
                "[timed_test] {} blew its {}ms budget ({}ms)",
                stringify!(#name),
                #budget_ms,
                __elapsed_ms
            );
        }
    };

    expanded.into()
}
