//! README and LICENSE text shipped alongside every generated app.

use chrono::{Datelike, Utc};

/// README listing the brief and the numbered checks.
pub fn readme(title: &str, brief: &str, checks: &[String]) -> String {
    let mut out = format!("# {title}\n\n## Summary\n\n{}\n", brief.trim());

    if !checks.is_empty() {
        out.push_str("\n## Requirements\n\n");
        for (i, check) in checks.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, check.trim()));
        }
    }

    out.push_str(
        "\n## Usage\n\nOpen `index.html` in a browser, or visit the GitHub Pages URL for this repository.\n",
    );
    out.push_str("\n## License\n\nMIT. See `LICENSE`.\n");
    out
}

/// MIT license for the current year.
pub fn mit_license(holder: &str) -> String {
    mit_license_for_year(holder, Utc::now().year())
}

fn mit_license_for_year(holder: &str, year: i32) -> String {
    format!(
        r#"MIT License

Copyright (c) {year} {holder}

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
"#
    )
}
