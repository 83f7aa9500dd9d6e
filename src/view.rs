use crate::pipeline::Prediction;
use axum::response::Html;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Traffic Sign Classifier</title>
  <style>
    body { font-family: sans-serif; max-width: 40rem; margin: 3rem auto; padding: 0 1rem; }
    .error { color: #b00020; border: 1px solid #b00020; padding: 0.75rem; }
    .result { border: 1px solid #2e7d32; padding: 0.75rem; }
  </style>
</head>
<body>
  <h1>Traffic Sign Classifier</h1>
  <form action="/predict" method="post" enctype="multipart/form-data">
    <input type="file" name="file" accept="image/*">
    <button type="submit">Classify</button>
  </form>
"#;

const PAGE_TAIL: &str = "</body>\n</html>\n";

/// What the index page shows below the upload form.
#[derive(Debug)]
pub enum PageView<'a> {
    Form,
    Error(&'a str),
    Result(&'a Prediction),
}

pub fn render(view: PageView<'_>) -> Html<String> {
    let mut page = String::from(PAGE_HEAD);
    match view {
        PageView::Form => {}
        PageView::Error(message) => {
            page.push_str(&format!(
                "  <p class=\"error\">{}</p>\n",
                escape_html(message)
            ));
        }
        PageView::Result(prediction) => {
            page.push_str(&format!(
                concat!(
                    "  <div class=\"result\">\n",
                    "    <h2>{}</h2>\n",
                    "    <p>Confidence: {}%</p>\n",
                    "    <p>Class ID: {}</p>\n",
                    "  </div>\n",
                ),
                escape_html(&prediction.label),
                prediction.confidence,
                prediction.class_id
            ));
        }
    }
    page.push_str(PAGE_TAIL);
    Html(page)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Confidence;

    #[test]
    fn test_form_only() {
        let Html(page) = render(PageView::Form);

        assert!(page.contains(r#"name="file""#));
        assert!(!page.contains("class=\"error\""));
        assert!(!page.contains("class=\"result\""));
    }

    #[test]
    fn test_error_is_escaped() {
        let Html(page) = render(PageView::Error("bad <script>alert('x')</script> & more"));

        assert!(page.contains("bad &lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt; &amp; more"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn test_result_shows_label_confidence_and_class() {
        let prediction = Prediction {
            label: "Stop".to_string(),
            confidence: Confidence::from_score(0.8765),
            class_id: 14,
        };
        let Html(page) = render(PageView::Result(&prediction));

        assert!(page.contains("<h2>Stop</h2>"));
        assert!(page.contains("Confidence: 87.65%"));
        assert!(page.contains("Class ID: 14"));
    }
}
