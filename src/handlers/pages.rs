// Error/gate pages rendered on the redirect hot path for humans (not APIs).
// Shares a single gradient-card HTML template across all four states.

fn page(title: &str, gradient: (&str, &str), heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
            margin: 0;
            background: linear-gradient(135deg, {grad_a} 0%, {grad_b} 100%);
            color: white;
        }}
        .container {{
            text-align: center;
            padding: 2rem;
        }}
        h1 {{
            font-size: 3rem;
            margin: 0;
            opacity: 0.9;
        }}
        h2 {{
            font-size: 1.4rem;
            margin: 1rem 0;
            font-weight: 400;
        }}
        .code {{
            background: rgba(255, 255, 255, 0.2);
            padding: 0.5rem 1rem;
            border-radius: 8px;
            display: inline-block;
            margin: 1rem 0;
            font-family: monospace;
        }}
        form {{
            margin-top: 1.5rem;
        }}
        input[type="password"] {{
            padding: 0.6rem 0.8rem;
            border-radius: 6px;
            border: none;
            margin-right: 0.5rem;
        }}
        button {{
            padding: 0.6rem 1.2rem;
            border-radius: 6px;
            border: none;
            background: white;
            color: #333;
            font-weight: 600;
            cursor: pointer;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{heading}</h1>
        {body}
    </div>
</body>
</html>"#,
        title = title,
        grad_a = gradient.0,
        grad_b = gradient.1,
        heading = heading,
        body = body,
    )
}

pub fn not_found_page(short_code: &str) -> String {
    page(
        "Link Not Found",
        ("#667eea", "#764ba2"),
        "404",
        &format!(
            r#"<h2>Link Not Found</h2><div class="code">/{short_code}</div><p>This link doesn't exist or may have been removed.</p>"#,
            short_code = short_code
        ),
    )
}

pub fn expired_page(short_code: &str) -> String {
    page(
        "Link Expired",
        ("#f093fb", "#f5576c"),
        "Expired",
        &format!(
            r#"<h2>Link has expired</h2><div class="code">/{short_code}</div><p>The owner set an expiration date that has passed.</p>"#,
            short_code = short_code
        ),
    )
}

pub fn disabled_page(short_code: &str) -> String {
    page(
        "Link Disabled",
        ("#434343", "#000000"),
        "Disabled",
        &format!(
            r#"<h2>This Link Has Been Disabled</h2><div class="code">/{short_code}</div><p>The owner has turned this link off.</p>"#,
            short_code = short_code
        ),
    )
}

pub fn password_required_page(short_code: &str) -> String {
    page(
        "Password Required",
        ("#396afc", "#2948ff"),
        "Protected",
        &format!(
            r#"<h2>This link is password protected</h2>
<div class="code">/{short_code}</div>
<form method="post" action="/v1/links/{short_code}/unlock">
    <input type="password" name="password" placeholder="Enter password" required>
    <button type="submit">Unlock</button>
</form>"#,
            short_code = short_code
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_page_embeds_short_code() {
        assert!(not_found_page("abc123").contains("abc123"));
    }

    #[test]
    fn password_required_page_posts_to_unlock_endpoint() {
        let html = password_required_page("abc123");
        assert!(html.contains("/v1/links/abc123/unlock"));
    }
}
