//! REST 资源客户端：`/lanchonete/api/{insumos,movimentacoes_insumos,usuarios}`。

use crate::common::{AppError, AppResult, ValidationError};
use crate::conf::Settings;
use crate::model::{Insumo, Movimentacao, Usuario};
use crate::service::{DashboardAggregator, DashboardView, SessionManager};
use crate::util;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// 可通过 REST 资源读写的记录
pub trait Record: Serialize + DeserializeOwned {
    const RESOURCE: &'static str;

    /// 发送前的客户端校验
    fn check(&self) -> Result<(), ValidationError>;
}

impl Record for Insumo {
    const RESOURCE: &'static str = "insumos";

    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

impl Record for Movimentacao {
    const RESOURCE: &'static str = "movimentacoes_insumos";

    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

impl Record for Usuario {
    const RESOURCE: &'static str = "usuarios";

    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

#[derive(Clone)]
pub struct ApiClient {
    settings: Settings,
    timeout: Duration,
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(settings: &Settings, session: Arc<SessionManager>) -> AppResult<Self> {
        Url::parse(&settings.api.base_url)?;
        Ok(Self {
            settings: settings.clone(),
            timeout: Duration::from_secs(settings.api.timeout_secs),
            session,
        })
    }

    pub fn resource<T: Record>(&self) -> Resource<T> {
        Resource {
            url: self.settings.resource_url(T::RESOURCE),
            timeout: self.timeout,
            session: Arc::clone(&self.session),
            _record: PhantomData,
        }
    }

    pub fn insumos(&self) -> Resource<Insumo> {
        self.resource()
    }

    pub fn movimentacoes(&self) -> Resource<Movimentacao> {
        self.resource()
    }

    pub fn usuarios(&self) -> Resource<Usuario> {
        self.resource()
    }

    /// 当前用户在后端的数值 ID：优先取令牌中的 id 声明，否则按邮箱查 `/usuarios`
    pub async fn current_user_id(&self) -> AppResult<i64> {
        let user = self
            .session
            .current_user()
            .ok_or(AppError::NotAuthenticated)?;
        if let Some(id) = user.id {
            return Ok(id);
        }

        log::debug!("token carries no user id, looking up {}", user.subject);
        self.usuarios()
            .find_all()
            .await?
            .into_iter()
            .find(|u| {
                u.email.eq_ignore_ascii_case(&user.subject)
                    || u.email.eq_ignore_ascii_case(&user.username)
            })
            .and_then(|u| u.id)
            .ok_or(AppError::UnknownUser(user.subject))
    }

    /// 并发拉取两组集合后计算仪表盘
    pub async fn fetch_dashboard(&self, aggregator: &DashboardAggregator) -> AppResult<DashboardView> {
        let insumos = self.insumos();
        let movimentacoes = self.movimentacoes();
        let (insumos, movimentacoes) =
            futures::try_join!(insumos.find_all(), movimentacoes.find_all())?;
        Ok(aggregator.aggregate_now(&insumos, &movimentacoes))
    }
}

pub struct Resource<T> {
    url: String,
    timeout: Duration,
    session: Arc<SessionManager>,
    _record: PhantomData<T>,
}

impl<T: Record> Resource<T> {
    pub async fn find_all(&self) -> AppResult<Vec<T>> {
        log::debug!("GET {}", self.url);
        util::send_json(self.request(Method::GET, &self.url)).await
    }

    pub async fn find_by_id(&self, id: i64) -> AppResult<T> {
        let url = self.item_url(id);
        log::debug!("GET {}", url);
        util::send_json(self.request(Method::GET, &url)).await
    }

    pub async fn create(&self, record: &T) -> AppResult<T> {
        record.check()?;
        log::debug!("POST {}", self.url);
        util::send_json(self.request(Method::POST, &self.url).json(record)).await
    }

    pub async fn update(&self, id: i64, record: &T) -> AppResult<T> {
        record.check()?;
        let url = self.item_url(id);
        log::debug!("PUT {}", url);
        util::send_json(self.request(Method::PUT, &url).json(record)).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let url = self.item_url(id);
        log::debug!("DELETE {}", url);
        util::send_empty(self.request(Method::DELETE, &url)).await
    }

    fn item_url(&self, id: i64) -> String {
        format!("{}/{}", self.url, id)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let request = util::CLIENT.request(method, url).timeout(self.timeout);
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
