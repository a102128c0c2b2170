use proc_macro2::TokenStream;
use quote::quote;
use syn::{Error, ItemFn, ReturnType, Type};

/// Expands `#[modload_runtime::main]` into a blocking `fn main` driven by a `LocalRuntime`.
#[must_use]
pub fn expand_main(args: TokenStream, input: ItemFn) -> TokenStream {
    if input.sig.asyncness.is_none() {
        return Error::new_spanned(
            input.sig.fn_token,
            "#[modload_runtime::main] requires an `async fn`",
        )
        .to_compile_error();
    }

    if !returns_result(&input.sig.output) {
        return Error::new_spanned(
            &input.sig.output,
            "#[modload_runtime::main] requires the function to return a Result",
        )
        .to_compile_error();
    }

    let config = match profile(args) {
        Ok(config) => config,
        Err(err) => return err.to_compile_error(),
    };

    let ItemFn { attrs, vis, sig, block } = input;
    let name = &sig.ident;
    let output = &sig.output;

    quote! {
        #(#attrs)*
        #vis fn #name() #output {
            let runtime = ::modload_runtime::LocalRuntime::new(&#config)?;
            runtime.block_on(async move #block)
        }
    }
}

fn profile(args: TokenStream) -> Result<TokenStream, Error> {
    if args.is_empty() {
        return Ok(quote! { ::modload_runtime::RuntimeConfig::default() });
    }

    let ident: syn::Ident = syn::parse2(args)?;
    match ident.to_string().as_str() {
        "default" => Ok(quote! { ::modload_runtime::RuntimeConfig::default() }),
        "responsive" => Ok(quote! { ::modload_runtime::RuntimeConfig::responsive() }),
        _ => Err(Error::new_spanned(ident, "unknown runtime profile, expected `default` or `responsive`")),
    }
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    let Type::Path(path) = &**ty else {
        return false;
    };
    path.path.segments.last().is_some_and(|seg| seg.ident == "Result")
}
