use crate::models::{ConnectionState, DashboardView, Severity};

pub fn render_dashboard(view: &DashboardView) -> String {
    let cells: String = view
        .cells
        .iter()
        .map(|cell| {
            format!(
                r#"<div class="stat"><span class="label">{label}</span><span class="value" data-{key}>{text}</span></div>"#,
                label = escape(cell.label),
                key = cell.metric.key(),
                text = escape(&cell.text),
            )
        })
        .collect();

    let categories: String = view
        .queue_length_by_category
        .iter()
        .map(|(label, count)| format!("<li><span>{}</span><strong>{count}</strong></li>", escape(label)))
        .collect();

    let toasts: String = view
        .toasts
        .iter()
        .map(|toast| {
            format!(
                r#"<div class="toast {}">{}</div>"#,
                severity_class(toast.severity),
                escape(&toast.message)
            )
        })
        .collect();

    INDEX_HTML
        .replace("{{CONNECTION}}", connection_label(&view.connection))
        .replace("{{STALE_CLASS}}", if view.stale { "stale" } else { "live" })
        .replace("{{CELLS}}", &cells)
        .replace("{{CATEGORIES}}", &categories)
        .replace("{{TOASTS}}", &toasts)
        .replace(
            "{{UPDATED}}",
            &view
                .last_snapshot_at
                .map(|at| at.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string()),
        )
}

pub fn connection_label(state: &ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connecting => "Connecting",
        ConnectionState::Open => "Live",
        ConnectionState::Reconnecting { .. } => "Reconnecting, data may be stale",
        ConnectionState::Closed => "Disconnected, data is stale",
    }
}

fn severity_class(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Queue Dashboard</title>
  <style>
    :root {
      --ink: #1f2933;
      --muted: #7b8794;
      --accent: #2563eb;
      --warn: #d97706;
      --bad: #dc2626;
      --card: #ffffff;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: #f1f5f9;
      color: var(--ink);
      font-family: "Inter", "Segoe UI", sans-serif;
      padding: 32px 18px;
    }

    .banner {
      border-radius: 12px;
      padding: 10px 16px;
      margin-bottom: 20px;
      font-weight: 600;
    }

    .banner.live { background: #dcfce7; color: #166534; }
    .banner.stale { background: #fef3c7; color: #92400e; }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .stat {
      background: var(--card);
      border-radius: 16px;
      padding: 18px;
      display: grid;
      gap: 8px;
    }

    .stat .label {
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.1em;
      color: var(--muted);
    }

    .stat .value {
      font-size: 2rem;
      font-weight: 700;
    }

    ul.categories { list-style: none; padding: 0; }
    ul.categories li { display: flex; justify-content: space-between; padding: 6px 0; }

    #toasts { position: fixed; bottom: 16px; right: 16px; display: grid; gap: 8px; }
    .toast { color: white; padding: 12px 20px; border-radius: 10px; }
    .toast.info { background: var(--accent); }
    .toast.warning { background: var(--warn); }
    .toast.error { background: var(--bad); }
  </style>
</head>
<body>
  <div id="banner" class="banner {{STALE_CLASS}}">{{CONNECTION}}</div>
  <section id="cells" class="panel">{{CELLS}}</section>
  <h2>Queue by category</h2>
  <ul id="categories" class="categories">{{CATEGORIES}}</ul>
  <p class="hint">Last update: <span id="updated">{{UPDATED}}</span>
    <button id="refresh" type="button">Refresh</button></p>
  <div id="toasts">{{TOASTS}}</div>
  <script>
    const escapeHtml = (text) => String(text)
      .replaceAll('&', '&amp;').replaceAll('<', '&lt;').replaceAll('>', '&gt;');

    function paint(view) {
      const banner = document.getElementById('banner');
      banner.className = 'banner ' + (view.stale ? 'stale' : 'live');
      banner.textContent = view.stale ? 'Connection: ' + view.connection.state + ', data may be stale' : 'Live';
      for (const cell of view.cells) {
        const el = document.querySelector('[data-' + cell.metric.replaceAll('_', '-') + ']');
        if (el) el.textContent = cell.text;
      }
      document.getElementById('categories').innerHTML = Object.entries(view.queue_length_by_category)
        .map(([label, count]) => '<li><span>' + escapeHtml(label) + '</span><strong>' + count + '</strong></li>')
        .join('');
      document.getElementById('toasts').innerHTML = view.toasts
        .map((t) => '<div class="toast ' + t.severity + '">' + escapeHtml(t.message) + '</div>')
        .join('');
      if (view.last_snapshot_at) {
        document.getElementById('updated').textContent = new Date(view.last_snapshot_at).toLocaleTimeString();
      }
    }

    async function poll() {
      try {
        const res = await fetch('/api/view');
        if (res.ok) paint(await res.json());
      } catch (err) {
        console.error('view poll failed', err);
      }
    }

    document.getElementById('refresh').addEventListener('click', async (event) => {
      const button = event.currentTarget;
      button.disabled = true;
      try {
        await fetch('/api/refresh', { method: 'POST' });
      } finally {
        button.disabled = false;
        poll();
      }
    });

    setInterval(poll, 100);
  </script>
</body>
</html>
"#;
