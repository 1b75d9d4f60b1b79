use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// 为结构体生成 `ToObject` 实现，字段名转为 camelCase。
///
/// 字段属性：`#[object(rename = "name")]`、`#[object(skip)]`；
/// 结构体属性：`#[object(display)]` 用 `Display` 输出作为字符串表示。
#[proc_macro_derive(ToObject, attributes(object))]
pub fn derive_to_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => &named.named,
            Fields::Unit => {
                return Ok(impl_block(&input, quote! { ::pugjs::MapBuilder::new() }, false));
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(name, "ToObject 不支持元组结构体"));
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "ToObject 只能用于结构体")),
    };

    let display = struct_display(&input)?;

    let mut calls = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else { continue };
        let opts = field_options(field)?;
        if opts.skip {
            continue;
        }
        let key = opts
            .rename
            .unwrap_or_else(|| camel_case(&ident.to_string()));
        calls.push(quote! { .field(#key, &self.#ident) });
    }

    let builder = quote! { ::pugjs::MapBuilder::new() #(#calls)* };
    Ok(impl_block(&input, builder, display))
}

fn impl_block(
    input: &DeriveInput,
    builder: proc_macro2::TokenStream,
    display: bool,
) -> proc_macro2::TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let builder = if display {
        quote! { #builder.display(self) }
    } else {
        builder
    };
    quote! {
        impl #impl_generics ::pugjs::ToObject for #name #ty_generics #where_clause {
            fn to_object(&self) -> ::pugjs::Object {
                #builder.build()
            }
        }
    }
}

#[derive(Default)]
struct FieldOptions {
    rename: Option<String>,
    skip: bool,
}

fn field_options(field: &syn::Field) -> syn::Result<FieldOptions> {
    let mut opts = FieldOptions::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("object")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                opts.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let s: LitStr = meta.value()?.parse()?;
                opts.rename = Some(s.value());
                Ok(())
            } else {
                Err(meta.error("未知的 object 属性"))
            }
        })?;
    }
    Ok(opts)
}

fn struct_display(input: &DeriveInput) -> syn::Result<bool> {
    let mut display = false;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("object")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("display") {
                display = true;
                Ok(())
            } else {
                Err(meta.error("未知的 object 属性"))
            }
        })?;
    }
    Ok(display)
}

/// `created_at` -> `createdAt`
fn camel_case(s: &str) -> String {
    let s = s.strip_prefix("r#").unwrap_or(s);
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
