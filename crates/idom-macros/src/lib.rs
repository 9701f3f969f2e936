use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, FnArg, Ident, ItemFn, Pat, PatType, ReturnType, Type};

/// Turns a render function into an element constructor.
///
/// ```ignore
/// #[component]
/// fn Counter(start: i32) -> anyhow::Result<Container> {
///     let (count, set_count) = use_state(start)?;
///     Ok(html::button().on("onClick", move |_| set_count.set(count + 1)).child(count))
/// }
///
/// let element: ElementRef = Counter(0);
/// ```
///
/// The function may be `async`. Its return type must be a `Result` whose value
/// converts into a `Node` and whose error converts into `anyhow::Error`. Every
/// parameter is cloned into each render, so parameter types must be `Clone`.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = TokenStream2::from(attr);
    if !attr.is_empty() {
        return syn::Error::new_spanned(attr, "#[component] takes no arguments")
            .to_compile_error()
            .into();
    }
    let func = parse_macro_input!(item as ItemFn);
    match expand_component(func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parameter names and types, rejecting receivers, patterns and `impl Trait`.
fn component_props(func: &ItemFn) -> syn::Result<Vec<(Ident, Type)>> {
    func.sig
        .inputs
        .iter()
        .map(|arg| match arg {
            FnArg::Receiver(receiver) => Err(syn::Error::new_spanned(
                receiver,
                "components cannot take `self`",
            )),
            FnArg::Typed(PatType { pat, ty, .. }) => {
                let Pat::Ident(pat_ident) = &**pat else {
                    return Err(syn::Error::new_spanned(
                        pat,
                        "component parameters must be plain identifiers",
                    ));
                };
                if let Type::ImplTrait(_) = &**ty {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "component parameters must be concrete `Clone` types; \
                         pass callbacks as `Rc<dyn Fn(..)>` or an `EventHandler`",
                    ));
                }
                Ok((pat_ident.ident.clone(), (**ty).clone()))
            }
        })
        .collect()
}

fn expand_component(func: ItemFn) -> syn::Result<TokenStream2> {
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "generic components are not supported",
        ));
    }
    if let ReturnType::Default = func.sig.output {
        return Err(syn::Error::new_spanned(
            &func.sig,
            "components must return a `Result` of something convertible into a `Node`",
        ));
    }

    let props = component_props(&func)?;
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;

    let name = &sig.ident;
    let name_str = name.to_string();
    let render_ident = format_ident!("__render_{}", name);
    let mut render_sig = sig.clone();
    render_sig.ident = render_ident.clone();

    let params = props.iter().map(|(ident, ty)| quote!(#ident: #ty));
    let clones = props
        .iter()
        .map(|(ident, _)| quote!(let #ident = ::std::clone::Clone::clone(&#ident);));
    let args = props.iter().map(|(ident, _)| ident);
    let wrap = if sig.asyncness.is_some() {
        quote!(::idom_core::__private::boxed_render)
    } else {
        quote!(::idom_core::__private::ready_render)
    };

    Ok(quote! {
        #(#attrs)*
        #[allow(non_snake_case)]
        #vis fn #name(#(#params),*) -> ::idom_core::ElementRef {
            #[allow(non_snake_case)]
            #render_sig #block

            ::idom_core::FnElement::from_render_fn(#name_str, move || {
                #(#clones)*
                #wrap(#render_ident(#(#args),*))
            })
        }
    })
}
