//! HTML pages.

use woof_models::Prediction;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 56rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
h1 { font-size: 1.6rem; }
.drop { border: 2px dashed #888; border-radius: 8px; padding: 2.5rem; text-align: center; cursor: pointer; }
.drop.over { background: #f0f6ff; border-color: #36c; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(14rem, 1fr)); gap: 1rem; }
.card { border: 1px solid #ddd; border-radius: 8px; padding: .75rem; }
.card img { width: 100%; height: 12rem; object-fit: cover; border-radius: 4px; }
.card p { margin: .5rem 0 0; }
.actions { margin: 1.5rem 0; display: flex; gap: 1rem; }
.actions a { padding: .5rem 1rem; border-radius: 4px; background: #36c; color: #fff; text-decoration: none; }
.actions a.secondary { background: #777; }
#status { margin-top: 1rem; min-height: 1.2em; }
"#;

const UPLOAD_SCRIPT: &str = r#"
(function () {
  var drop = document.getElementById('drop');
  var input = document.getElementById('file');
  var status = document.getElementById('status');

  function upload(files) {
    var images = Array.prototype.filter.call(files, function (f) { return f.type.indexOf('image/') === 0; });
    if (images.length === 0) { status.textContent = 'Please choose image files.'; return; }
    status.textContent = 'Uploading ' + images.length + ' image(s)...';
    var sent = Promise.resolve();
    images.forEach(function (f, i) {
      sent = sent.then(function () {
        var form = new FormData();
        form.append('file[' + i + ']', f, f.name);
        return fetch('/', { method: 'POST', body: form, credentials: 'same-origin' }).then(function (r) {
          if (!r.ok) { throw new Error(f.name + ': ' + r.status); }
        });
      });
    });
    sent.then(function () { window.location = '/results'; })
        .catch(function (e) { status.textContent = 'Upload failed (' + e.message + ')'; });
  }

  drop.addEventListener('click', function () { input.click(); });
  input.addEventListener('change', function () { upload(input.files); });
  drop.addEventListener('dragover', function (e) { e.preventDefault(); drop.classList.add('over'); });
  drop.addEventListener('dragleave', function () { drop.classList.remove('over'); });
  drop.addEventListener('drop', function (e) {
    e.preventDefault();
    drop.classList.remove('over');
    upload(e.dataTransfer.files);
  });
})();
"#;

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

/// Upload form.
pub fn index_page() -> String {
    let body = format!(
        r#"<h1>Which dog breed do you look like?</h1>
<p>Upload photos of people or dogs. Each photo gets the closest matching dog breed.</p>
<div id="drop" class="drop">Drop images here or click to choose files</div>
<noscript>
<form method="post" action="/" enctype="multipart/form-data">
<input type="file" name="file" accept="image/*" multiple> <button type="submit">Upload</button>
</form>
<p>After uploading, continue to <a href="/results">your images</a>.</p>
</noscript>
<input id="file" type="file" accept="image/*" multiple hidden>
<div id="status"></div>
<script>{UPLOAD_SCRIPT}</script>"#
    );
    layout("Dog breed classifier", &body)
}

/// Uploaded images, waiting for predictions.
pub fn results_page(urls: &[String]) -> String {
    let cards: String = urls
        .iter()
        .map(|url| {
            format!(
                "<div class=\"card\"><img src=\"{}\" alt=\"uploaded image\"></div>\n",
                escape_html(url)
            )
        })
        .collect();

    let body = format!(
        r#"<h1>Your images</h1>
<div class="grid">
{cards}</div>
<div class="actions"><a href="/predictions">Get predictions</a><a class="secondary" href="/">Start over</a></div>"#
    );
    layout("Uploaded images", &body)
}

/// Images next to their predictions.
pub fn predictions_page(predictions: &[Prediction]) -> String {
    let cards: String = predictions
        .iter()
        .map(|p| {
            format!(
                "<div class=\"card\"><img src=\"{}\" alt=\"uploaded image\"><p class=\"{}\">{}</p></div>\n",
                escape_html(&p.url),
                p.verdict.as_str(),
                escape_html(&p.message)
            )
        })
        .collect();

    let body = format!(
        r#"<h1>Predictions</h1>
<div class="grid">
{cards}</div>
<div class="actions"><a href="/">Try more images</a></div>"#
    );
    layout("Predictions", &body)
}
