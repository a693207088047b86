//! Renderers for the per-site nginx vhost and PHP-FPM pool.
//!
//! Pure functions of the record and layout; callers decide where the
//! output is written.

use crate::layout::Layout;
use crate::model::{Identity, SiteRecord};

/// Wildcard certificate issued for all domain-flavoured sites.
pub const WILDCARD_CERT: &str = "_wildcard.loc.wp.pem";
pub const WILDCARD_KEY: &str = "_wildcard.loc.wp-key.pem";

pub fn nginx_vhost(record: &SiteRecord, layout: &Layout) -> String {
    let logs = layout.logs_dir(&record.name);
    let root = record.wp_root.display();
    let socket = Layout::fpm_socket(&record.name);

    let body = format!(
        r"    root {root};
    index index.php index.html;

    access_log {logs}/access.log;
    error_log  {logs}/error.log;

    location / {{
        try_files $uri $uri/ /index.php?$args;
    }}

    location ~ \.php$ {{
        fastcgi_pass unix:{socket};
        fastcgi_index index.php;
        fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
        include fastcgi_params;
    }}

    location ~* \.(js|css|png|jpg|jpeg|gif|ico|svg|woff|woff2|ttf|eot)$ {{
        expires max;
        log_not_found off;
    }}
",
        logs = logs.display(),
    );

    match &record.identity {
        Identity::Port(port) => format!(
            "server {{
    listen {port};
    server_name localhost;
{body}}}
"
        ),
        Identity::Domain(domain) => {
            let ssl = layout.ssl_dir();
            format!(
                "server {{
    listen 80;
    server_name {domain};
    return 301 https://$host$request_uri;
}}

server {{
    listen 443 ssl;
    server_name {domain};

    ssl_certificate     {cert};
    ssl_certificate_key {key};

{body}}}
",
                cert = ssl.join(WILDCARD_CERT).display(),
                key = ssl.join(WILDCARD_KEY).display(),
            )
        }
    }
}

/// PHP-FPM pool running as `user`, listening on the site's socket.
pub fn fpm_pool(record: &SiteRecord, layout: &Layout, user: &str) -> String {
    let name = &record.name;
    format!(
        "[{name}]
user = {user}
group = staff
listen = {socket}
listen.owner = {user}
listen.group = staff
listen.mode = 0660

pm = ondemand
pm.max_children = 5
pm.process_idle_timeout = 10s

php_admin_value[error_log] = {logs}/php-error.log
",
        socket = Layout::fpm_socket(name),
        logs = layout.logs_dir(name).display(),
    )
}
