use crate::view::{render, PageView};
use axum::response::Html;

pub async fn index() -> Html<String> {
    render(PageView::Form)
}
