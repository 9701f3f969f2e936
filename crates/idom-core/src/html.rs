//! Constructors for common HTML tags.
//!
//! ```ignore
//! use idom_core::html::{button, div};
//! let view = div().child(button().attr("id", "go").child("Go"));
//! ```

use crate::model::Container;

macro_rules! html_tags {
    ($($tag:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $tag() -> Container {
                Container::new(stringify!($tag))
            }
        )*
    };
}

html_tags!(
    a, article, aside, b, blockquote, br, button, canvas, code, div, em, footer, form, h1, h2, h3,
    h4, h5, h6, header, hr, i, img, input, label, li, main, nav, ol, option, p, pre, section,
    select, small, span, strong, table, tbody, td, textarea, th, thead, tr, ul,
);

#[cfg(test)]
mod tests {
    #[test]
    fn tag_names_match_function_names() {
        assert_eq!(super::div().tag(), "div");
        assert_eq!(super::h1().tag(), "h1");
        assert_eq!(super::textarea().tag(), "textarea");
    }
}
