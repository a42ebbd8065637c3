//! The `domain!` macro.

/// Declares a typed domain interface.
///
/// Each method becomes an `async fn` forwarding to
/// [`DomainProxy`](crate::proxy::DomainProxy). Arguments map to the wire
/// names after `=>`; `Option` arguments left `None` are omitted. Methods
/// without `-> T` return `Result<()>`. `returns "field"` extracts one field
/// of the result object.
///
/// # Example
///
/// ```ignore
/// devtools_rpc::domain! {
///     /// Page domain.
///     pub struct Page = "Page" {
///         fn enable = "enable" ();
///         fn navigate = "navigate" (url: String => "url") -> String, returns "frameId";
///     }
/// }
///
/// let frame_id = client.domain::<Page>().navigate("https://example.com".into()).await?;
/// ```
///
/// `returns` without a return type is rejected:
///
/// ```compile_fail
/// devtools_rpc::domain! {
///     pub struct Broken = "Broken" {
///         fn enable = "enable" (), returns "frameId";
///     }
/// }
/// ```
#[macro_export]
macro_rules! domain {
    (
        @method [$(#[$fmeta:meta])*] $domain:literal, $fn_name:ident, $method:literal,
        [$( $arg:ident : $arg_ty:ty => $wire:literal ),*], [], [$field:literal]
    ) => {
        ::std::compile_error!(::std::concat!(
            "`", $domain, ".", $method, "`: `returns ", $field, "` needs a `-> T` return type"
        ));
    };

    (
        @method [$(#[$fmeta:meta])*] $domain:literal, $fn_name:ident, $method:literal,
        [$( $arg:ident : $arg_ty:ty => $wire:literal ),*], [], []
    ) => {
        $(#[$fmeta])*
        pub async fn $fn_name(&self $(, $arg: $arg_ty)*) -> $crate::Result<()> {
            static SIGNATURE: $crate::proxy::MethodSignature = $crate::proxy::MethodSignature {
                domain: $domain,
                method: $method,
                params: &[$( $wire ),*],
                returns: $crate::protocol::ReturnShape::Void,
            };
            let args: ::std::vec::Vec<$crate::serde_json::Value> =
                ::std::vec![$( $crate::proxy::to_argument(&$arg)? ),*];
            self.proxy.call_void(&SIGNATURE, args).await
        }
    };

    (
        @method [$(#[$fmeta:meta])*] $domain:literal, $fn_name:ident, $method:literal,
        [$( $arg:ident : $arg_ty:ty => $wire:literal ),*], [$ret:ty], [$( $field:literal )?]
    ) => {
        $(#[$fmeta])*
        pub async fn $fn_name(&self $(, $arg: $arg_ty)*) -> $crate::Result<$ret> {
            static SIGNATURE: $crate::proxy::MethodSignature = $crate::proxy::MethodSignature {
                domain: $domain,
                method: $method,
                params: &[$( $wire ),*],
                returns: $crate::domain!(@shape $( $field )?),
            };
            let args: ::std::vec::Vec<$crate::serde_json::Value> =
                ::std::vec![$( $crate::proxy::to_argument(&$arg)? ),*];
            self.proxy.call::<$ret>(&SIGNATURE, args).await
        }
    };

    (@shape) => {
        $crate::protocol::ReturnShape::Payload
    };

    (@shape $field:literal) => {
        $crate::protocol::ReturnShape::Field($field)
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = $domain:literal {
            $(
                $(#[$fmeta:meta])*
                fn $fn_name:ident = $method:literal (
                    $( $arg:ident : $arg_ty:ty => $wire:literal ),* $(,)?
                ) $( -> $ret:ty )? $( , returns $field:literal )? ;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            proxy: $crate::proxy::DomainProxy,
        }

        impl $crate::proxy::Domain for $name {
            const NAME: &'static str = $domain;

            fn from_proxy(proxy: $crate::proxy::DomainProxy) -> Self {
                Self { proxy }
            }
        }

        impl $name {
            $(
                $crate::domain!(
                    @method
                    [$(#[$fmeta])*]
                    $domain, $fn_name, $method,
                    [$( $arg : $arg_ty => $wire ),*],
                    [$( $ret )?],
                    [$( $field )?]
                );
            )*
        }
    };
}
