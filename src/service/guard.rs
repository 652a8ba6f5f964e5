use crate::model::ROLE_ADMIN;
use crate::service::SessionManager;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Insumos,
    Movimentacoes,
    Usuarios,
}

impl Route {
    /// 空路径与未知路径都回到登录页
    pub fn resolve(path: &str) -> Route {
        match path.trim().trim_matches('/') {
            "dashboard" => Route::Dashboard,
            "insumos" => Route::Insumos,
            "movimentacoes" => Route::Movimentacoes,
            "usuarios" => Route::Usuarios,
            _ => Route::Login,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Insumos => "/insumos",
            Route::Movimentacoes => "/movimentacoes",
            Route::Usuarios => "/usuarios",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Login)
    }

    /// 为空表示只需登录
    pub fn required_roles(&self) -> &'static [&'static str] {
        match self {
            Route::Usuarios => &[ROLE_ADMIN],
            _ => &[],
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(Route),
}

/// 路由守卫
pub struct Gate<'a> {
    session: &'a SessionManager,
}

impl<'a> Gate<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    pub fn may_enter(&self, route: Route) -> bool {
        self.check(route) == GateDecision::Allow
    }

    /// 未登录或令牌过期时跳转登录页（并清空会话）；缺少角色时跳转仪表盘
    pub fn check(&self, route: Route) -> GateDecision {
        if !route.requires_auth() {
            return GateDecision::Allow;
        }

        if !self.session.validate() {
            tracing::debug!("{} denied: not authenticated", route);
            return GateDecision::Redirect(Route::Login);
        }

        let roles = route.required_roles();
        if !roles.is_empty() && !self.session.has_any_role(roles.iter().copied()) {
            tracing::debug!("{} denied: missing role {:?}", route, roles);
            return GateDecision::Redirect(Route::Dashboard);
        }

        GateDecision::Allow
    }
}
